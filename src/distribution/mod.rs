//! Block selection
//!
//! Chooses which block each IO touches. Distributions produce block numbers
//! `0..num_blocks`; the generator turns them into byte offsets with
//! `offset = block_num * block_size`, so every offset is block aligned.
//!
//! - **Sequential**: 0, 1, 2, ... wrapping at the end of the target
//! - **Uniform**: every block equally likely, drawn from the run's [`RandomSource`]
//!
//! # Example
//!
//! ```
//! use precondition::distribution::{Distribution, uniform::UniformDistribution};
//! use precondition::util::random::RandomSource;
//!
//! let mut rng = RandomSource::with_seed(1);
//! let mut dist = UniformDistribution::new();
//! let block_num = dist.next_block(1024, &mut rng);
//! assert!(block_num < 1024);
//! ```

use crate::config::AccessPattern;
use crate::util::random::RandomSource;

pub mod sequential;
pub mod uniform;

/// Block number generator
///
/// Called once per IO, so implementations must stay cheap.
pub trait Distribution: Send {
    /// Next block number in `[0, num_blocks)`; 0 when `num_blocks` is 0
    fn next_block(&mut self, num_blocks: u64, rng: &mut RandomSource) -> u64;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Distribution implementing `pattern`
pub fn for_pattern(pattern: AccessPattern) -> Box<dyn Distribution> {
    match pattern {
        AccessPattern::Sequential => Box::new(sequential::SequentialDistribution::new()),
        AccessPattern::Random => Box::new(uniform::UniformDistribution::new()),
    }
}
