//! Random source for payload and offset generation
//!
//! One `RandomSource` is owned by each IO generator. It fills the shared write
//! payload once, and afterwards drives every per-IO random decision: block
//! numbers for random access, the write-vs-read trial and the payload offset.
//!
//! Uses the xoshiro256++ PRNG which is very fast and has good statistical
//! properties. This matters since it is called several times per IO.

use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Seeded uniform random generator
pub struct RandomSource {
    rng: Xoshiro256PlusPlus,
}

impl RandomSource {
    /// Create a generator seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_entropy(),
        }
    }

    /// Create a generator with a specific seed
    ///
    /// Useful for reproducible runs and tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Seeded when a seed is given, from entropy otherwise
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::from_entropy(),
        }
    }

    /// Fill `buffer` with uniformly distributed bytes
    pub fn fill_bytes(&mut self, buffer: &mut [u8]) {
        self.rng.fill_bytes(buffer);
    }

    /// Uniform integer in `[0, bound)`; returns 0 for an empty range
    #[inline(always)]
    pub fn below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.rng.gen_range(0..bound)
    }

    /// Bernoulli trial that succeeds with probability `percent / 100`
    #[inline(always)]
    pub fn percent_trial(&mut self, percent: u8) -> bool {
        self.rng.gen_range(0..100u8) < percent
    }

    /// Uniform multiple of `alignment` in `[0, max]`
    ///
    /// `max` is rounded down to a multiple of `alignment` first, so the result
    /// never exceeds it.
    #[inline(always)]
    pub fn aligned_offset(&mut self, max: usize, alignment: usize) -> usize {
        debug_assert!(alignment > 0);
        let slots = max / alignment;
        self.rng.gen_range(0..=slots) * alignment
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sources_repeat() {
        let mut a = RandomSource::with_seed(12345);
        let mut b = RandomSource::with_seed(12345);

        for _ in 0..32 {
            assert_eq!(a.below(1_000_000), b.below(1_000_000));
        }

        let mut buf_a = [0u8; 64];
        let mut buf_b = [0u8; 64];
        a.fill_bytes(&mut buf_a);
        b.fill_bytes(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }

    #[test]
    fn test_below_stays_in_range() {
        let mut rng = RandomSource::with_seed(7);
        for _ in 0..10_000 {
            assert!(rng.below(10) < 10);
        }
        assert_eq!(rng.below(0), 0);
        assert_eq!(rng.below(1), 0);
    }

    #[test]
    fn test_percent_trial_extremes() {
        let mut rng = RandomSource::with_seed(1);
        for _ in 0..1000 {
            assert!(rng.percent_trial(100));
            assert!(!rng.percent_trial(0));
        }
    }

    #[test]
    fn test_percent_trial_binomial_interval() {
        // 99% interval for Binomial(100_000, 0.30): mean 30_000, sd ~144.9
        const TRIALS: u64 = 100_000;
        let mut rng = RandomSource::with_seed(0x5eed);
        let writes = (0..TRIALS).filter(|_| rng.percent_trial(30)).count() as f64;

        let p = 0.30;
        let mean = TRIALS as f64 * p;
        let sd = (TRIALS as f64 * p * (1.0 - p)).sqrt();
        let half_width = 2.576 * sd;

        assert!(
            (writes - mean).abs() <= half_width,
            "write count {} outside [{:.0}, {:.0}]",
            writes,
            mean - half_width,
            mean + half_width
        );
    }

    #[test]
    fn test_aligned_offset_bounds_and_alignment() {
        let mut rng = RandomSource::with_seed(99);
        let mut saw_max = false;
        let mut saw_zero = false;

        for _ in 0..200_000 {
            let offset = rng.aligned_offset(8 * 512, 512);
            assert_eq!(offset % 512, 0);
            assert!(offset <= 8 * 512);
            saw_max |= offset == 8 * 512;
            saw_zero |= offset == 0;
        }

        assert!(saw_max && saw_zero, "both endpoints should be reachable");
    }
}
