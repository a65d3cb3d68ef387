//! Clock abstraction
//!
//! Every time-dependent component (throughput meter, steady-state detector,
//! status line) reads time through a [`Clock`] instead of calling the OS
//! directly. Production runs use [`MonotonicClock`]; tests drive a
//! [`ManualClock`] so multi-hour scenarios run in milliseconds.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of monotonic time
///
/// `now()` returns the time since an arbitrary, fixed epoch. Only
/// differences between readings are meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Clock shared between the components of one run
pub type SharedClock = Arc<dyn Clock>;

/// CLOCK_MONOTONIC backed clock
///
/// Read with a direct `clock_gettime` call; the detector and meter sample it
/// on every completion.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn shared() -> SharedClock {
        Arc::new(MonotonicClock)
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&self) -> Duration {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        // SAFETY: ts is a valid timespec and CLOCK_MONOTONIC always exists
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }

        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    }
}

/// Manually advanced clock for tests and simulations
///
/// Clones share the same underlying time, so a test can keep one handle and
/// hand another to the code under test.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `delta`
    pub fn advance(&self, delta: Duration) {
        self.nanos.fetch_add(delta.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Jump to an absolute reading (must not go backwards)
    pub fn set(&self, now: Duration) {
        let nanos = now.as_nanos() as u64;
        let previous = self.nanos.swap(nanos, Ordering::Relaxed);
        debug_assert!(nanos >= previous, "ManualClock moved backwards");
    }

    pub fn shared(&self) -> SharedClock {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}
