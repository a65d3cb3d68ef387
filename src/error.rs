//! Typed failures of a preconditioning run
//!
//! Everything that can abort a run is one of these variants. They travel
//! inside `anyhow::Error` (see [`crate::Result`]) so callers can add context
//! with `.context(...)` and still `downcast_ref::<PreconditionError>()` when
//! they need to tell failures apart.

use crate::engine::OperationType;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreconditionError {
    /// A parameter is out of its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("failed to open target {path}: {source}")]
    TargetOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to determine size of target {path}: {source}")]
    TargetSize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target has no whole sector to write
    #[error("target {path} is empty (size {size} bytes)")]
    EmptyTarget { path: PathBuf, size: u64 },

    #[error("failed to submit {op} at offset {offset}: {source}")]
    Submit {
        op: OperationType,
        offset: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("{op} of {length} bytes at offset {offset} failed: {source}")]
    Io {
        op: OperationType,
        offset: u64,
        length: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("short {op} at offset {offset}: expected {expected} bytes, transferred {actual}")]
    ShortTransfer {
        op: OperationType,
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("failed to flush target: {source}")]
    Flush {
        #[source]
        source: std::io::Error,
    },

    /// Internal bookkeeping disagrees with itself
    #[error("internal consistency check failed: {0}")]
    Invariant(String),
}

impl PreconditionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}
