//! io_uring IO engine
//!
//! Asynchronous engine on Linux's io_uring interface (kernel 5.1+). This is
//! the default engine: the whole outstanding window lives in one ring, and a
//! single `io_uring_enter` both pushes newly queued operations and waits for
//! the next completion.
//!
//! # Features
//!
//! - Submission queue sized to the queue depth
//! - Batch submission: operations queued by `submit()` reach the kernel together
//! - Batch completion: one poll drains every completion that is ready
//! - Retries the wait when interrupted by a signal
//!
//! # Requirements
//!
//! - Linux kernel 5.1 or later
//! - io_uring feature must be enabled in Cargo.toml (on by default)
//!
//! # Example
//!
//! ```no_run
//! use precondition::engine::{IOEngine, EngineConfig};
//! use precondition::engine::io_uring::IoUringEngine;
//!
//! let mut engine = IoUringEngine::new();
//! engine.init(&EngineConfig { queue_depth: 128 })?;
//!
//! // ... submit operations ...
//!
//! let mut completions = Vec::new();
//! engine.poll_completions(&mut completions)?;
//! engine.cleanup()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::{EngineConfig, IOCompletion, IOEngine, IOOperation, OperationType};
use crate::Result;
use anyhow::Context;
use io_uring::{opcode, types, IoUring};
use std::collections::HashMap;
use std::io::ErrorKind;

/// io_uring IO engine
pub struct IoUringEngine {
    /// The io_uring instance
    ring: Option<IoUring>,

    /// Map of user_data to operation type for completion tracking
    ///
    /// When we submit an operation, we store its type here so we can
    /// include it in the IOCompletion when it completes.
    pending_ops: HashMap<u64, OperationType>,
}

impl IoUringEngine {
    /// Create a new io_uring engine
    pub fn new() -> Self {
        Self {
            ring: None,
            pending_ops: HashMap::new(),
        }
    }

    fn ring(&mut self) -> Result<&mut IoUring> {
        self.ring
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("io_uring engine not initialized"))
    }

    /// Enter the kernel until at least one completion is available
    fn wait_for_one(ring: &mut IoUring) -> Result<()> {
        loop {
            match ring.submit_and_wait(1) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to submit and wait for completions"),
            }
        }
    }
}

impl Default for IoUringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IOEngine for IoUringEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        let entries = config.queue_depth.max(1) as u32;
        let ring = IoUring::new(entries).context("Failed to create io_uring instance")?;

        self.ring = Some(ring);
        self.pending_ops = HashMap::with_capacity(config.queue_depth);

        Ok(())
    }

    fn submit(&mut self, op: IOOperation) -> Result<()> {
        // Build the appropriate io_uring operation
        let entry = match op.op_type {
            OperationType::Read => opcode::Read::new(types::Fd(op.target_fd), op.buffer, op.length as u32)
                .offset(op.offset)
                .build()
                .user_data(op.user_data),
            OperationType::Write => {
                opcode::Write::new(types::Fd(op.target_fd), op.buffer as *const u8, op.length as u32)
                    .offset(op.offset)
                    .build()
                    .user_data(op.user_data)
            }
        };

        let ring = self.ring()?;

        // SAFETY: the caller guarantees the buffer outlives the operation
        let queued = unsafe { ring.submission().push(&entry).is_ok() };
        if !queued {
            // Flush the queue to the kernel to make room, then retry once
            ring.submit().context("Failed to flush full submission queue")?;
            unsafe {
                ring.submission()
                    .push(&entry)
                    .map_err(|_| anyhow::anyhow!("Submission queue full"))?;
            }
        }

        self.pending_ops.insert(op.user_data, op.op_type);
        Ok(())
    }

    fn poll_completions(&mut self, completions: &mut Vec<IOCompletion>) -> Result<usize> {
        if self.pending_ops.is_empty() {
            return Ok(0);
        }

        let ring = self
            .ring
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("io_uring engine not initialized"))?;
        Self::wait_for_one(ring)?;

        let before = completions.len();
        for cqe in ring.completion() {
            let user_data = cqe.user_data();
            let result_code = cqe.result();

            let op_type = self
                .pending_ops
                .remove(&user_data)
                .ok_or_else(|| anyhow::anyhow!("Completion for unknown operation (user_data={})", user_data))?;

            // Negative result is an errno
            let result = if result_code >= 0 {
                Ok(result_code as usize)
            } else {
                Err(std::io::Error::from_raw_os_error(-result_code))
            };

            completions.push(IOCompletion {
                user_data,
                result,
                op_type,
            });
        }

        Ok(completions.len() - before)
    }

    fn in_flight(&self) -> usize {
        self.pending_ops.len()
    }

    fn cleanup(&mut self) -> Result<()> {
        if let Some(ring) = self.ring.as_mut() {
            // Reap anything still outstanding so the kernel is done with the buffers
            while !self.pending_ops.is_empty() {
                Self::wait_for_one(ring)?;
                for cqe in ring.completion() {
                    self.pending_ops.remove(&cqe.user_data());
                }
            }
        }

        // Drop the ring (automatic cleanup)
        self.ring = None;
        self.pending_ops.clear();

        Ok(())
    }

    fn name(&self) -> &'static str {
        "io_uring"
    }
}
