//! Windowed throughput meter
//!
//! Counts completions into the current period and reports the figures of the
//! previous, complete period. Reported values therefore lag by up to one
//! period and read zero until the first period has elapsed.

use crate::util::clock::SharedClock;
use crate::util::time::{calculate_iops, calculate_throughput};
use std::time::Duration;

const BYTES_PER_MB: f64 = 1_048_576.0;

pub struct ThroughputMeter {
    clock: SharedClock,
    period: Duration,
    last_reset: Option<Duration>,
    current_ios: u64,
    current_bytes: u64,
    previous_ios: u64,
    previous_bytes: u64,
}

impl ThroughputMeter {
    pub fn new(clock: SharedClock, period: Duration) -> Self {
        Self {
            clock,
            period,
            last_reset: None,
            current_ios: 0,
            current_bytes: 0,
            previous_ios: 0,
            previous_bytes: 0,
        }
    }

    /// Record one completion of `bytes` bytes
    ///
    /// The first call, and any call more than one period after the last
    /// rotation, moves the current counters into the previous period first.
    #[inline]
    pub fn track_completion(&mut self, bytes: u64) {
        let now = self.clock.now();
        let rotate = match self.last_reset {
            None => true,
            Some(last) => now > last + self.period,
        };

        if rotate {
            self.previous_ios = self.current_ios;
            self.previous_bytes = self.current_bytes;
            self.current_ios = 0;
            self.current_bytes = 0;
            self.last_reset = Some(now);
        }

        self.current_ios += 1;
        self.current_bytes += bytes;
    }

    /// Completions per second over the previous period
    pub fn iops(&self) -> f64 {
        calculate_iops(self.previous_ios, self.period)
    }

    /// Mebibytes per second over the previous period
    pub fn mbps(&self) -> f64 {
        calculate_throughput(self.previous_bytes, self.period) / BYTES_PER_MB
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
