//! IO engine abstraction
//!
//! An IO engine submits read and write operations against an open target and
//! hands back their completions. The generator keeps a fixed number of
//! operations outstanding through this interface and never blocks anywhere
//! else, so the engine decides how the wait actually happens.
//!
//! # Engine Types
//!
//! - **io_uring**: Linux async IO interface (Linux 5.1+, default)
//! - **Synchronous**: Blocking pread/pwrite; every operation has completed by
//!   the time `submit()` returns (always available)
//! - **Mock**: No system calls at all; scripted completions for tests
//!
//! # Example
//!
//! ```no_run
//! use precondition::engine::{IOEngine, EngineConfig, IOOperation, OperationType};
//! use precondition::engine::sync::SyncEngine;
//!
//! let mut engine = SyncEngine::new();
//! engine.init(&EngineConfig { queue_depth: 32 })?;
//!
//! let mut buffer = vec![0u8; 4096];
//! engine.submit(IOOperation {
//!     op_type: OperationType::Read,
//!     target_fd: 3,
//!     offset: 0,
//!     buffer: buffer.as_mut_ptr(),
//!     length: buffer.len(),
//!     user_data: 0,
//! })?;
//!
//! let mut completions = Vec::new();
//! engine.poll_completions(&mut completions)?;
//! engine.cleanup()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};
use std::os::unix::io::RawFd;

/// IO engine trait for all backends
///
/// # Lifecycle
///
/// 1. Create engine instance (via `new()` on concrete type or [`create_engine`])
/// 2. Call `init()` with configuration
/// 3. Submit operations via `submit()` and collect completions via `poll_completions()`
/// 4. Call `cleanup()` when done
///
/// # Thread Safety
///
/// Engines must be `Send` so a run can be moved to another thread, but are
/// never shared. One generator owns one engine.
pub trait IOEngine: Send {
    /// Initialize the engine with the given configuration
    ///
    /// Called once before any IO. Async engines size their kernel queues from
    /// `config.queue_depth`.
    fn init(&mut self, config: &EngineConfig) -> Result<()>;

    /// Submit an IO operation to the engine
    ///
    /// Async engines queue the operation and return immediately; it reaches the
    /// kernel no later than the next `poll_completions()`. The sync engine
    /// performs the operation before returning.
    ///
    /// # Errors
    ///
    /// An error here means the operation could not be queued at all. A failure
    /// of the IO itself is reported through its [`IOCompletion`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - The buffer pointer in `op` is valid for `op.length` bytes and properly aligned
    /// - The buffer remains valid until the operation completes
    /// - The file descriptor is valid and open
    fn submit(&mut self, op: IOOperation) -> Result<()>;

    /// Collect completed operations into `completions`
    ///
    /// Blocks until at least one operation has completed, then appends every
    /// completion that is ready without blocking again. Returns the number
    /// appended. Returns 0 immediately when nothing is in flight.
    ///
    /// Completions may arrive in any order.
    fn poll_completions(&mut self, completions: &mut Vec<IOCompletion>) -> Result<usize>;

    /// Number of submitted operations whose completion has not been returned
    fn in_flight(&self) -> usize;

    /// Cleanup and release engine resources
    ///
    /// Waits for anything still in flight before releasing kernel resources.
    fn cleanup(&mut self) -> Result<()>;

    /// Short engine name for logs
    fn name(&self) -> &'static str;
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of outstanding IO operations (queue depth)
    ///
    /// For io_uring this sizes the submission and completion queues. The sync
    /// engine ignores it.
    pub queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { queue_depth: 32 }
    }
}

/// IO operation descriptor
///
/// `user_data` is returned unchanged in the matching [`IOCompletion`]; the
/// generator stores the index of the operation slot there.
///
/// # Safety
///
/// The buffer pointer must be valid and properly aligned for the duration of the
/// operation. For O_DIRECT operations, buffers must be aligned to the device's
/// logical block size (typically 512 or 4096 bytes).
#[derive(Debug)]
pub struct IOOperation {
    pub op_type: OperationType,

    /// File descriptor of the target file or device
    pub target_fd: RawFd,

    /// Byte offset within the target
    pub offset: u64,

    /// Source (write) or destination (read) of the transfer
    pub buffer: *mut u8,

    /// Length of the transfer in bytes
    pub length: usize,

    pub user_data: u64,
}

// Safety: IOOperation contains a raw pointer but is only used within a single thread
// and the pointer lifetime is managed by the caller
unsafe impl Send for IOOperation {}

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Read,
    Write,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationType::Read => write!(f, "read"),
            OperationType::Write => write!(f, "write"),
        }
    }
}

/// Completed IO operation
#[derive(Debug)]
pub struct IOCompletion {
    /// User data from the original IOOperation
    pub user_data: u64,

    /// Bytes transferred, or the OS error the operation failed with
    ///
    /// A byte count below the requested length is a short transfer; engines
    /// report it as-is and leave the decision to the caller.
    pub result: std::io::Result<usize>,

    pub op_type: OperationType,
}

/// Selectable engine backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    /// Linux io_uring (kernel 5.1+)
    #[value(name = "io_uring")]
    #[serde(rename = "io_uring")]
    IoUring,
    /// Blocking pread/pwrite
    Sync,
}

impl Default for EngineType {
    fn default() -> Self {
        if cfg!(feature = "io_uring") {
            EngineType::IoUring
        } else {
            EngineType::Sync
        }
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineType::IoUring => write!(f, "io_uring"),
            EngineType::Sync => write!(f, "sync"),
        }
    }
}

/// Create an uninitialised engine of the given type
pub fn create_engine(engine_type: EngineType) -> Result<Box<dyn IOEngine>> {
    match engine_type {
        #[cfg(feature = "io_uring")]
        EngineType::IoUring => Ok(Box::new(io_uring::IoUringEngine::new())),
        #[cfg(not(feature = "io_uring"))]
        EngineType::IoUring => anyhow::bail!("io_uring engine not compiled in (enable the io_uring feature)"),
        EngineType::Sync => Ok(Box::new(sync::SyncEngine::new())),
    }
}

pub mod mock;
pub mod sync;

#[cfg(feature = "io_uring")]
pub mod io_uring;
