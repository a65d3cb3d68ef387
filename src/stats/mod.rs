//! Run statistics
//!
//! - [`window`]: fixed-capacity sliding window of bins
//! - [`regression`]: least-squares fit of bin counts against bin index
//! - [`steady_state`]: detector deciding when throughput has settled
//! - [`throughput`]: per-period IOPS and MB/s for the status line

pub mod regression;
pub mod steady_state;
pub mod throughput;
pub mod window;

pub use steady_state::{DetectorState, SteadyStateConfig, SteadyStateDetector};
pub use throughput::ThroughputMeter;
