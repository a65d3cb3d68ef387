//! File target implementation
//!
//! A regular file that already exists. Its size comes from the file's
//! metadata; it is never created, extended or truncated.
//!
//! # Example
//!
//! ```no_run
//! use precondition::target::{Target, OpenFlags};
//! use precondition::target::file::FileTarget;
//! use std::path::PathBuf;
//!
//! let mut target = FileTarget::new(PathBuf::from("/tmp/testfile"));
//! target.open(OpenFlags { direct: true })?;
//!
//! let fd = target.fd()?;
//! let size = target.size();
//!
//! target.flush()?;
//! target.close()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::{OpenFlags, Target, DEFAULT_SECTOR_SIZE};
use crate::error::PreconditionError;
use crate::Result;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// File target for regular files
pub struct FileTarget {
    /// Path to the file
    path: PathBuf,

    /// Open handle (Some when open)
    file: Option<File>,

    /// File size observed at open
    size: u64,
}

impl FileTarget {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            size: 0,
        }
    }

    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("File not open: {}", self.path.display()))
    }
}

impl Target for FileTarget {
    fn open(&mut self, flags: OpenFlags) -> Result<()> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);

        if flags.direct {
            options.custom_flags(libc::O_DIRECT);
        }

        let file = options.open(&self.path).map_err(|source| PreconditionError::TargetOpen {
            path: self.path.clone(),
            source,
        })?;

        let metadata = file.metadata().map_err(|source| PreconditionError::TargetSize {
            path: self.path.clone(),
            source,
        })?;

        self.size = metadata.len();
        self.file = Some(file);

        Ok(())
    }

    fn fd(&self) -> Result<RawFd> {
        Ok(self.file()?.as_raw_fd())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn query_size(&self) -> Result<u64> {
        let metadata = self.file()?.metadata().map_err(|source| PreconditionError::TargetSize {
            path: self.path.clone(),
            source,
        })?;
        Ok(metadata.len())
    }

    fn logical_block_size(&self) -> u64 {
        DEFAULT_SECTOR_SIZE
    }

    fn flush(&self) -> Result<()> {
        self.file()?
            .sync_all()
            .map_err(|source| PreconditionError::Flush { source })?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the handle closes the descriptor
        self.file = None;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
