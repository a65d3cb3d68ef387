//! Mock IO engine for testing
//!
//! Simulates IO without touching any file descriptor or buffer, so generator
//! behaviour can be checked quickly and deterministically.
//!
//! # Features
//!
//! - Tracks all submitted operations
//! - Injects an OS error after a given number of successful completions
//! - Reports short transfers on demand
//! - Limits how many completions one poll returns, optionally in reverse order
//! - Advances a [`ManualClock`] per completion to simulate device latency
//!
//! Clones share state, so a test can keep a handle after boxing the engine.
//!
//! # Example
//!
//! ```
//! use precondition::engine::{IOEngine, EngineConfig, IOOperation, OperationType};
//! use precondition::engine::mock::MockEngine;
//!
//! let mut engine = MockEngine::new();
//! engine.init(&EngineConfig::default()).unwrap();
//!
//! engine.submit(IOOperation {
//!     op_type: OperationType::Write,
//!     target_fd: 1,
//!     offset: 0,
//!     buffer: std::ptr::null_mut(),
//!     length: 4096,
//!     user_data: 42,
//! }).unwrap();
//!
//! let mut completions = Vec::new();
//! engine.poll_completions(&mut completions).unwrap();
//! assert_eq!(completions[0].user_data, 42);
//! assert_eq!(*completions[0].result.as_ref().unwrap(), 4096);
//! ```

use super::{EngineConfig, IOCompletion, IOEngine, IOOperation, OperationType};
use crate::util::clock::ManualClock;
use crate::Result;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Record of a submitted operation for testing verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    pub op_type: OperationType,
    pub target_fd: i32,
    pub offset: u64,
    pub length: usize,
    pub user_data: u64,
    /// Address of the transfer buffer
    pub buffer: usize,
}

struct MockState {
    config: Option<EngineConfig>,
    pending: VecDeque<IOOperation>,
    submitted: Vec<OperationRecord>,
    completed: usize,
    /// Completions that succeed before every further one fails
    fail_after: Option<usize>,
    errno: i32,
    /// 0 means the requested length
    bytes_per_op: usize,
    /// 0 means unlimited
    max_per_poll: usize,
    reverse_order: bool,
    latency: Option<(ManualClock, Duration)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            config: None,
            pending: VecDeque::new(),
            submitted: Vec::new(),
            completed: 0,
            fail_after: None,
            errno: libc::EIO,
            bytes_per_op: 0,
            max_per_poll: 0,
            reverse_order: false,
            latency: None,
        }
    }
}

/// Mock IO engine for testing
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    /// Create a mock engine that succeeds every operation in full
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Configure the engine to fail all operations
    pub fn set_should_fail(&self, should_fail: bool) {
        self.state().fail_after = if should_fail { Some(0) } else { None };
    }

    /// Let `count` operations succeed, then fail every later one
    pub fn set_fail_after(&self, count: usize) {
        self.state().fail_after = Some(count);
    }

    /// errno reported by failing operations (EIO by default)
    pub fn set_errno(&self, errno: i32) {
        self.state().errno = errno;
    }

    /// Set the number of bytes returned for successful operations
    ///
    /// 0 (default) returns the requested length. Anything else simulates a
    /// short transfer.
    pub fn set_bytes_per_op(&self, bytes: usize) {
        self.state().bytes_per_op = bytes;
    }

    /// Return at most `count` completions per poll (0 = all)
    pub fn set_max_completions_per_poll(&self, count: usize) {
        self.state().max_per_poll = count;
    }

    /// Return each poll's completions newest first
    pub fn set_reverse_order(&self, reverse: bool) {
        self.state().reverse_order = reverse;
    }

    /// Advance `clock` by `latency` for every completion returned
    pub fn set_latency(&self, clock: ManualClock, latency: Duration) {
        self.state().latency = Some((clock, latency));
    }

    /// Queue depth the engine was initialised with
    pub fn queue_depth(&self) -> Option<usize> {
        self.state().config.as_ref().map(|c| c.queue_depth)
    }

    /// Get the number of operations currently pending
    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Get a copy of all submitted operations for verification
    pub fn submitted_operations(&self) -> Vec<OperationRecord> {
        self.state().submitted.clone()
    }

    /// Get the number of submitted operations
    pub fn submitted_count(&self) -> usize {
        self.state().submitted.len()
    }

    /// Clear the submitted operations history
    pub fn clear_submitted_operations(&self) {
        self.state().submitted.clear();
    }
}

impl IOEngine for MockEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        self.state().config = Some(config.clone());
        Ok(())
    }

    fn submit(&mut self, op: IOOperation) -> Result<()> {
        let mut state = self.state();
        state.submitted.push(OperationRecord {
            op_type: op.op_type,
            target_fd: op.target_fd,
            offset: op.offset,
            length: op.length,
            user_data: op.user_data,
            buffer: op.buffer as usize,
        });
        state.pending.push_back(op);
        Ok(())
    }

    fn poll_completions(&mut self, completions: &mut Vec<IOCompletion>) -> Result<usize> {
        let mut state = self.state();

        let available = state.pending.len();
        let limit = match state.max_per_poll {
            0 => available,
            max => max.min(available),
        };

        let mut batch: Vec<IOOperation> = state.pending.drain(..limit).collect();
        if state.reverse_order {
            batch.reverse();
        }

        for op in batch {
            if let Some((clock, latency)) = &state.latency {
                clock.advance(*latency);
            }

            let fail = state.fail_after.map_or(false, |n| state.completed >= n);
            state.completed += 1;

            let result = if fail {
                Err(io::Error::from_raw_os_error(state.errno))
            } else if state.bytes_per_op == 0 {
                Ok(op.length)
            } else {
                Ok(state.bytes_per_op)
            };

            completions.push(IOCompletion {
                user_data: op.user_data,
                result,
                op_type: op.op_type,
            });
        }

        Ok(limit)
    }

    fn in_flight(&self) -> usize {
        self.pending_count()
    }

    fn cleanup(&mut self) -> Result<()> {
        self.state().pending.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
