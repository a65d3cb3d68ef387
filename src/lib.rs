//! precondition - drive a storage target into a representative state
//!
//! Before a drive is benchmarked it should be written the way the benchmark
//! will use it. `precondition` keeps a fixed window of asynchronous IOs
//! outstanding against a file or block device, either until every block has
//! been written once or until measured throughput stops trending.
//!
//! # Architecture
//!
//! - **IO engines**: io_uring (default) and a synchronous fallback behind the
//!   [`IOEngine`] trait
//! - **Targets**: regular files and block devices, sized and aligned to the
//!   device's logical sector
//! - **Generator**: the [`IOGenerator`] posts, reaps and reposts IOs from a
//!   fixed set of operation slots
//! - **Steady state**: a throughput meter feeds 100 ms samples into a sliding
//!   window whose least-squares slope decides convergence

pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod generator;
pub mod output;
pub mod stats;
pub mod target;
pub mod util;

// Re-export commonly used types
pub use config::{AccessPattern, Parameters};
pub use engine::IOEngine;
pub use error::PreconditionError;
pub use generator::{IOGenerator, RunSummary, Termination};
pub use stats::{SteadyStateDetector, ThroughputMeter};

/// Result type used throughout precondition
pub type Result<T> = anyhow::Result<T>;
