//! Synchronous IO engine
//!
//! Blocking pread/pwrite engine. It needs no kernel features beyond POSIX and
//! serves as the fallback when io_uring is unavailable.
//!
//! # Features
//!
//! - Uses pread/pwrite for positioned IO without changing file offset
//! - Supports O_DIRECT for bypassing page cache
//! - Continues partial transfers until complete, EOF, or error
//! - Retries system calls interrupted by signals
//!
//! # Performance
//!
//! Each `submit()` blocks until the transfer is done, so the effective queue
//! depth is 1 no matter how many slots the generator keeps. Completed
//! operations are buffered until the next `poll_completions()`.
//!
//! # Example
//!
//! ```no_run
//! use precondition::engine::{IOEngine, EngineConfig, IOOperation, OperationType};
//! use precondition::engine::sync::SyncEngine;
//!
//! let mut engine = SyncEngine::new();
//! engine.init(&EngineConfig::default())?;
//!
//! let mut buffer = vec![0u8; 4096];
//! engine.submit(IOOperation {
//!     op_type: OperationType::Read,
//!     target_fd: 3,
//!     offset: 0,
//!     buffer: buffer.as_mut_ptr(),
//!     length: 4096,
//!     user_data: 1,
//! })?;
//!
//! // Poll returns the completed operation immediately
//! let mut completions = Vec::new();
//! assert_eq!(engine.poll_completions(&mut completions)?, 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::{EngineConfig, IOCompletion, IOEngine, IOOperation, OperationType};
use crate::Result;
use std::collections::VecDeque;
use std::io;

/// Synchronous IO engine using pread/pwrite
pub struct SyncEngine {
    /// Operations that finished in `submit()` and have not been polled yet
    completed: VecDeque<IOCompletion>,
}

impl SyncEngine {
    /// Create a new synchronous IO engine
    pub fn new() -> Self {
        Self {
            completed: VecDeque::new(),
        }
    }

    /// Perform a read operation using pread
    ///
    /// Returns the number of bytes read, which is short only if end of file
    /// was reached.
    #[inline(always)]
    fn do_read(fd: i32, buffer: *mut u8, length: usize, offset: u64) -> io::Result<usize> {
        let mut total_read = 0;

        while total_read < length {
            let remaining = length - total_read;
            let buf_ptr = unsafe { buffer.add(total_read) };

            // SAFETY: the caller provides a buffer valid for `length` bytes
            let result = unsafe {
                libc::pread(
                    fd,
                    buf_ptr as *mut libc::c_void,
                    remaining,
                    (offset + total_read as u64) as libc::off_t,
                )
            };

            if result < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            if result == 0 {
                // EOF: report what we have
                break;
            }

            total_read += result as usize;
        }

        Ok(total_read)
    }

    /// Perform a write operation using pwrite
    ///
    /// Returns the number of bytes written, which is short only if the kernel
    /// stopped accepting data without reporting an error.
    #[inline(always)]
    fn do_write(fd: i32, buffer: *const u8, length: usize, offset: u64) -> io::Result<usize> {
        let mut total_written = 0;

        while total_written < length {
            let remaining = length - total_written;
            let buf_ptr = unsafe { buffer.add(total_written) };

            // SAFETY: the caller provides a buffer valid for `length` bytes
            let result = unsafe {
                libc::pwrite(
                    fd,
                    buf_ptr as *const libc::c_void,
                    remaining,
                    (offset + total_written as u64) as libc::off_t,
                )
            };

            if result < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            if result == 0 {
                break;
            }

            total_written += result as usize;
        }

        Ok(total_written)
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IOEngine for SyncEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        self.completed = VecDeque::with_capacity(config.queue_depth);
        Ok(())
    }

    fn submit(&mut self, op: IOOperation) -> Result<()> {
        // For synchronous engine, we perform the operation immediately
        let result = match op.op_type {
            OperationType::Read => Self::do_read(op.target_fd, op.buffer, op.length, op.offset),
            OperationType::Write => Self::do_write(op.target_fd, op.buffer as *const u8, op.length, op.offset),
        };

        self.completed.push_back(IOCompletion {
            user_data: op.user_data,
            result,
            op_type: op.op_type,
        });

        Ok(())
    }

    fn poll_completions(&mut self, completions: &mut Vec<IOCompletion>) -> Result<usize> {
        let count = self.completed.len();
        completions.extend(self.completed.drain(..));
        Ok(count)
    }

    fn in_flight(&self) -> usize {
        self.completed.len()
    }

    fn cleanup(&mut self) -> Result<()> {
        self.completed.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sync"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::os::unix::io::AsRawFd;
    use tempfile::TempDir;

    fn engine() -> SyncEngine {
        let mut engine = SyncEngine::new();
        engine.init(&EngineConfig::default()).unwrap();
        engine
    }

    #[test]
    fn test_sync_engine_read() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_read.dat");
        let test_data = b"Reading a target synchronously, one block at a time.";
        std::fs::write(&file_path, test_data).unwrap();
        let file = File::open(&file_path).unwrap();

        let mut engine = engine();
        let mut buffer = vec![0u8; test_data.len()];
        engine
            .submit(IOOperation {
                op_type: OperationType::Read,
                target_fd: file.as_raw_fd(),
                offset: 0,
                buffer: buffer.as_mut_ptr(),
                length: buffer.len(),
                user_data: 42,
            })
            .unwrap();
        assert_eq!(engine.in_flight(), 1);

        let mut completions = Vec::new();
        assert_eq!(engine.poll_completions(&mut completions).unwrap(), 1);
        assert_eq!(completions[0].user_data, 42);
        assert_eq!(completions[0].op_type, OperationType::Read);
        assert_eq!(*completions[0].result.as_ref().unwrap(), test_data.len());
        assert_eq!(&buffer[..], test_data);
        assert_eq!(engine.in_flight(), 0);
    }

    #[test]
    fn test_sync_engine_write_at_offset() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test_write.dat");
        std::fs::write(&file_path, b"0123456789").unwrap();
        let file = OpenOptions::new().read(true).write(true).open(&file_path).unwrap();

        let mut engine = engine();
        let data = b"ABC";
        engine
            .submit(IOOperation {
                op_type: OperationType::Write,
                target_fd: file.as_raw_fd(),
                offset: 4,
                buffer: data.as_ptr() as *mut u8,
                length: data.len(),
                user_data: 7,
            })
            .unwrap();

        let mut completions = Vec::new();
        engine.poll_completions(&mut completions).unwrap();
        assert_eq!(*completions[0].result.as_ref().unwrap(), 3);

        drop(file);
        assert_eq!(std::fs::read(&file_path).unwrap(), b"0123ABC789");
    }

    #[test]
    fn test_read_past_eof_is_short() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("short.dat");
        std::fs::write(&file_path, vec![1u8; 100]).unwrap();
        let file = File::open(&file_path).unwrap();

        let mut engine = engine();
        let mut buffer = vec![0u8; 512];
        engine
            .submit(IOOperation {
                op_type: OperationType::Read,
                target_fd: file.as_raw_fd(),
                offset: 0,
                buffer: buffer.as_mut_ptr(),
                length: buffer.len(),
                user_data: 0,
            })
            .unwrap();

        let mut completions = Vec::new();
        engine.poll_completions(&mut completions).unwrap();
        assert_eq!(*completions[0].result.as_ref().unwrap(), 100);
    }

    #[test]
    fn test_sync_engine_error_handling() {
        let mut engine = engine();
        let mut buffer = vec![0u8; 100];
        engine
            .submit(IOOperation {
                op_type: OperationType::Read,
                target_fd: -1,
                offset: 0,
                buffer: buffer.as_mut_ptr(),
                length: buffer.len(),
                user_data: 1,
            })
            .unwrap();

        let mut completions = Vec::new();
        engine.poll_completions(&mut completions).unwrap();
        let err = completions[0].result.as_ref().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_completions_queue_until_polled() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("queue.dat");
        std::fs::write(&file_path, vec![0u8; 4096]).unwrap();
        let file = File::open(&file_path).unwrap();

        let mut engine = engine();
        let mut buffers = vec![vec![0u8; 1024]; 4];
        for (i, buffer) in buffers.iter_mut().enumerate() {
            engine
                .submit(IOOperation {
                    op_type: OperationType::Read,
                    target_fd: file.as_raw_fd(),
                    offset: (i * 1024) as u64,
                    buffer: buffer.as_mut_ptr(),
                    length: 1024,
                    user_data: i as u64,
                })
                .unwrap();
        }
        assert_eq!(engine.in_flight(), 4);

        let mut completions = Vec::new();
        assert_eq!(engine.poll_completions(&mut completions).unwrap(), 4);
        let order: Vec<u64> = completions.iter().map(|c| c.user_data).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);

        engine.cleanup().unwrap();
        assert_eq!(engine.in_flight(), 0);
    }
}
