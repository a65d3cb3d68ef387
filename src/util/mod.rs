//! Utility modules
//!
//! Aligned buffers, time sources, the random source and logging setup.

pub mod buffer;
pub mod clock;
pub mod logging;
pub mod random;
pub mod time;
