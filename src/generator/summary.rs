//! Outcome of a completed run

use crate::config::Parameters;
use crate::stats::regression::LinearFit;
use crate::util::time::whole_minutes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why the run stopped posting IO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every block of the target was posted once
    TargetReached,
    SteadyStateAchieved,
    /// The steady-state wait ceiling passed first
    SteadyStateAbandoned,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::TargetReached => write!(f, "target reached"),
            Termination::SteadyStateAchieved => write!(f, "steady-state achieved"),
            Termination::SteadyStateAbandoned => write!(f, "steady-state abandoned"),
        }
    }
}

/// Human-readable reason a steady-state run stopped, `None` for fixed runs
pub fn steady_state_reason(termination: Termination, elapsed: Duration) -> Option<String> {
    let minutes = whole_minutes(elapsed);
    match termination {
        Termination::SteadyStateAchieved => Some(format!("achieved steady-state after {} minutes", minutes)),
        Termination::SteadyStateAbandoned => Some(format!("abandoned steady-state after {} minutes", minutes)),
        Termination::TargetReached => None,
    }
}

/// Counters and results of one run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Target as the user named it
    pub target: String,
    pub engine: &'static str,
    pub parameters: Parameters,
    pub effective_size: u64,
    pub total_blocks: u64,
    pub posted_ios: u64,
    pub completed_ios: u64,
    pub completed_bytes: u64,
    pub reads: u64,
    pub writes: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub termination: Termination,
    /// Last regression over the steady-state window, if one was computed
    pub final_fit: Option<LinearFit>,
    /// Throughput of the last complete meter period
    pub last_mbps: f64,
    pub last_iops: f64,
}

impl RunSummary {
    pub fn reason(&self) -> Option<String> {
        steady_state_reason(self.termination, self.elapsed)
    }

    /// Mean bytes per second over the whole run
    pub fn average_bytes_per_sec(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.completed_bytes as f64 / seconds
        } else {
            0.0
        }
    }
}
