//! Steady-state detection
//!
//! Completions are counted into 100 ms bins. Once a full window of bins has
//! been gathered, a least-squares line is fitted through the window on every
//! bin boundary. A slope within tolerance starts a dwell; if it stays within
//! tolerance for the whole dwell time, steady state is achieved. A run that
//! never settles is abandoned after a fixed ceiling.
//!
//! # States
//!
//! ```text
//! Warming --full--> Gathering <--slope out of tolerance-- Dwelling
//!    |                  |                                    |
//!    +---slope ok-------+---slope ok------> Dwelling --dwell elapsed--> Achieved
//!
//! any non-terminal state --elapsed >= max wait--> Abandoned
//! ```
//!
//! `Achieved` and `Abandoned` are absorbing.
//!
//! # Example
//!
//! ```
//! use precondition::stats::steady_state::{SteadyStateConfig, SteadyStateDetector};
//! use precondition::util::clock::ManualClock;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let config = SteadyStateConfig { gather_seconds: 1, dwell_seconds: 1, ..Default::default() };
//! let mut detector = SteadyStateDetector::new(config, clock.shared()).unwrap();
//!
//! // 10 completions per 100 ms bin, for three seconds
//! for _ in 0..300 {
//!     detector.track_completion();
//!     clock.advance(Duration::from_millis(10));
//! }
//! assert!(detector.done());
//! ```

use super::regression::{IndexRegression, LinearFit};
use super::window::CircularWindow;
use crate::error::PreconditionError;
use crate::util::clock::SharedClock;
use crate::Result;
use std::time::Duration;

/// Bins per second of gathered history
pub const BINS_PER_SECOND: u64 = 10;

/// Width of one bin
pub const BIN_WIDTH: Duration = Duration::from_millis(1000 / BINS_PER_SECOND);

pub const DEFAULT_GATHER_SECONDS: u64 = 540;
pub const DEFAULT_DWELL_SECONDS: u64 = 60;
pub const DEFAULT_SLOPE_TOLERANCE: f64 = 0.001;

/// Longest a run waits for steady state before giving up
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(6 * 60 * 60);

/// Detector tuning
#[derive(Debug, Clone, PartialEq)]
pub struct SteadyStateConfig {
    /// Seconds of history in the regression window
    pub gather_seconds: u64,
    /// Seconds the slope must stay within tolerance
    pub dwell_seconds: u64,
    /// Largest absolute slope (completions per bin, per bin) considered flat
    pub slope_tolerance: f64,
    pub max_wait: Duration,
}

impl Default for SteadyStateConfig {
    fn default() -> Self {
        Self {
            gather_seconds: DEFAULT_GATHER_SECONDS,
            dwell_seconds: DEFAULT_DWELL_SECONDS,
            slope_tolerance: DEFAULT_SLOPE_TOLERANCE,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorState {
    /// Window not yet full
    Warming,
    /// Window full, slope out of tolerance
    Gathering,
    /// Slope within tolerance since `since`
    Dwelling { since: Duration },
    Achieved,
    Abandoned,
}

impl DetectorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DetectorState::Achieved | DetectorState::Abandoned)
    }
}

pub struct SteadyStateDetector {
    config: SteadyStateConfig,
    clock: SharedClock,
    started: Duration,
    dwell: Duration,
    bins: CircularWindow<u64>,
    regression: IndexRegression,
    committed_bins: usize,
    next_bin_start: Option<Duration>,
    state: DetectorState,
    fit: Option<LinearFit>,
}

impl SteadyStateDetector {
    /// Create a detector whose clock starts now
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::InvalidParameter`] for a zero gather time.
    pub fn new(config: SteadyStateConfig, clock: SharedClock) -> Result<Self> {
        if config.gather_seconds == 0 {
            return Err(PreconditionError::invalid("steady-state gather time must be non-zero").into());
        }

        let window_bins = usize::try_from(config.gather_seconds.saturating_mul(BINS_PER_SECOND))
            .map_err(|_| PreconditionError::invalid("steady-state gather time is too large"))?;

        let started = clock.now();

        Ok(Self {
            dwell: Duration::from_secs(config.dwell_seconds),
            bins: CircularWindow::new(window_bins, 0),
            regression: IndexRegression::new(window_bins),
            committed_bins: 0,
            next_bin_start: None,
            state: DetectorState::Warming,
            fit: None,
            config,
            clock,
            started,
        })
    }

    /// Count one completion at the current time
    ///
    /// Crossing one or more bin boundaries commits the current bin, pads any
    /// idle bins with zero and re-evaluates the fit. Calls inside the same bin
    /// only bump a counter.
    #[inline]
    pub fn track_completion(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        let now = self.clock.now();
        if now.saturating_sub(self.started) >= self.config.max_wait {
            self.state = DetectorState::Abandoned;
            return;
        }

        let next = match self.next_bin_start {
            Some(next) => next,
            None => now + BIN_WIDTH,
        };

        if now >= next {
            let bin_nanos = BIN_WIDTH.as_nanos();
            let crossed = (now - next).as_nanos() / bin_nanos + 1;
            self.advance_bins(crossed);
            self.next_bin_start = Some(next + Duration::from_nanos((crossed * bin_nanos) as u64));
            *self.bins.current_mut() += 1;
            self.evaluate(now);
        } else {
            self.next_bin_start = Some(next);
            *self.bins.current_mut() += 1;
        }
    }

    fn advance_bins(&mut self, count: u128) {
        let capacity = self.bins.capacity();

        if count > capacity as u128 {
            // Everything in the window, including the in-progress bin, is
            // replaced by idle bins.
            self.bins.reset();
            self.committed_bins = capacity;
            return;
        }

        for _ in 0..count {
            self.bins.advance();
        }
        self.committed_bins = (self.committed_bins + count as usize).min(capacity);
    }

    fn evaluate(&mut self, now: Duration) {
        if !self.is_full() {
            return;
        }

        let fit = self.regression.fit(&self.bins);
        self.fit = Some(fit);

        if fit.slope.abs() <= self.config.slope_tolerance {
            let since = match self.state {
                DetectorState::Dwelling { since } => since,
                _ => now,
            };
            self.state = if now.saturating_sub(since) >= self.dwell {
                DetectorState::Achieved
            } else {
                DetectorState::Dwelling { since }
            };
        } else {
            self.state = DetectorState::Gathering;
        }
    }

    /// A full window of bins has been committed
    pub fn is_full(&self) -> bool {
        self.committed_bins >= self.bins.capacity()
    }

    /// Steady state was achieved
    pub fn done(&self) -> bool {
        self.state == DetectorState::Achieved
    }

    /// The wait ceiling was reached first
    pub fn abandoned(&self) -> bool {
        self.state == DetectorState::Abandoned
    }

    /// No further completions will change the outcome
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Fit as of the most recent bin boundary, once the window is full
    pub fn linear_fit(&self) -> Option<LinearFit> {
        self.fit
    }

    /// Time since the detector was created
    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started)
    }

    pub fn config(&self) -> &SteadyStateConfig {
        &self.config
    }

    /// One-line description of where the detector is
    pub fn progress_message(&self) -> String {
        let slope = self.fit.map(|f| f.slope).unwrap_or(0.0);

        match self.state {
            DetectorState::Achieved => "steady-state achieved".to_string(),
            DetectorState::Abandoned => "steady-state abandoned".to_string(),
            DetectorState::Warming => {
                let pct = self.committed_bins as f64 / self.bins.capacity() as f64 * 100.0;
                format!("gathering data {:.1}%", pct)
            }
            DetectorState::Dwelling { since } => {
                let dwelt = self.clock.now().saturating_sub(since);
                let pct = if self.dwell.is_zero() {
                    100.0
                } else {
                    (dwelt.as_secs_f64() / self.dwell.as_secs_f64() * 100.0).min(100.0)
                };
                format!("dwelling {:.1}%, slope {:.4}", pct, slope)
            }
            DetectorState::Gathering => format!("awaiting steady-state, slope {:.4}", slope),
        }
    }
}
