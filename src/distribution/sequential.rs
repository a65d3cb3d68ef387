//! Sequential block generation
//!
//! Generates sequential block numbers starting from 0 and incrementing by 1.
//! When the end of the target is reached, wraps back to the beginning, so the
//! n-th call (counting from 0) returns `n mod num_blocks`.

use crate::distribution::Distribution;
use crate::util::random::RandomSource;

/// Sequential block generator
#[derive(Debug, Default)]
pub struct SequentialDistribution {
    /// Next block number to hand out
    current_block: u64,
}

impl SequentialDistribution {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Distribution for SequentialDistribution {
    #[inline]
    fn next_block(&mut self, num_blocks: u64, _rng: &mut RandomSource) -> u64 {
        if num_blocks == 0 {
            return 0;
        }

        // num_blocks is fixed for a run, but stay in range if it ever shrinks
        let block = self.current_block % num_blocks;

        self.current_block = block + 1;
        if self.current_block >= num_blocks {
            self.current_block = 0;
        }

        block
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_basic() {
        let mut rng = RandomSource::with_seed(0);
        let mut dist = SequentialDistribution::new();

        let blocks: Vec<u64> = (0..4).map(|_| dist.next_block(100, &mut rng)).collect();
        assert_eq!(blocks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_sequential_wraparound() {
        let mut rng = RandomSource::with_seed(0);
        let mut dist = SequentialDistribution::new();

        let blocks: Vec<u64> = (0..7).map(|_| dist.next_block(3, &mut rng)).collect();
        assert_eq!(blocks, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_sequential_single_block() {
        let mut rng = RandomSource::with_seed(0);
        let mut dist = SequentialDistribution::new();

        for _ in 0..5 {
            assert_eq!(dist.next_block(1, &mut rng), 0);
        }
    }

    #[test]
    fn test_sequential_zero_blocks() {
        let mut rng = RandomSource::with_seed(0);
        let mut dist = SequentialDistribution::new();
        assert_eq!(dist.next_block(0, &mut rng), 0);
    }
}
