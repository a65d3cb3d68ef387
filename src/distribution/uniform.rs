//! Uniform random distribution
//!
//! Every block of the target is equally likely on every call. There is no
//! memory of earlier picks, so blocks can repeat before others are visited.

use crate::distribution::Distribution;
use crate::util::random::RandomSource;

/// Uniform block generator
#[derive(Debug, Default)]
pub struct UniformDistribution;

impl UniformDistribution {
    pub fn new() -> Self {
        Self
    }
}

impl Distribution for UniformDistribution {
    #[inline(always)]
    fn next_block(&mut self, num_blocks: u64, rng: &mut RandomSource) -> u64 {
        rng.below(num_blocks)
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}
