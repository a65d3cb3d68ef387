//! User-facing output
//!
//! The self-overwriting status line, the overwrite confirmation prompt and
//! the JSON run summary. Diagnostics go through `tracing` instead.

pub mod json;
pub mod prompt;
pub mod status;
