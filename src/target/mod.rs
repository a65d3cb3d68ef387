//! Target abstraction
//!
//! A target is the file or block device being preconditioned. It must already
//! exist: preconditioning never creates, extends or truncates anything, and a
//! run fails if the target's size changes underneath it.
//!
//! # Target Types
//!
//! - **File**: Regular files on any filesystem
//! - **Block Device**: Raw disks and partitions, sized via ioctl
//!
//! A command line target that is a bare integer `N` names the raw disk
//! `/dev/disk/by-diskseq/N`; anything else is a path.
//!
//! # Example
//!
//! ```no_run
//! use precondition::target::{open_target, effective_size, OpenFlags, TargetSpec};
//!
//! let spec = TargetSpec::parse("/tmp/testfile");
//! let target = open_target(&spec, OpenFlags { direct: true })?;
//! let usable = effective_size(target.size(), target.logical_block_size());
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::error::PreconditionError;
use crate::Result;
use std::fmt;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

pub mod block;
pub mod file;

/// Sector size assumed for regular files
pub const DEFAULT_SECTOR_SIZE: u64 = 512;

/// Directory where the kernel publishes disks by sequence number
pub const DISKSEQ_DIR: &str = "/dev/disk/by-diskseq";

/// Target trait for IO targets
///
/// # Lifecycle
///
/// 1. Create target instance (via `new()` on concrete type, or [`open_target`])
/// 2. Call `open()` with flags
/// 3. Use `fd()` for IO operations
/// 4. Call `flush()` after the last write, then `close()`
pub trait Target: Send {
    /// Open an existing target for reading and writing
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::TargetOpen`] if the target cannot be
    /// opened, or [`PreconditionError::TargetSize`] if its size cannot be read.
    fn open(&mut self, flags: OpenFlags) -> Result<()>;

    /// File descriptor for IO engines; an error if the target is not open
    fn fd(&self) -> Result<RawFd>;

    /// Size in bytes observed when the target was opened
    fn size(&self) -> u64;

    /// Ask the OS for the current size
    fn query_size(&self) -> Result<u64>;

    /// Smallest addressable unit for direct IO
    fn logical_block_size(&self) -> u64 {
        DEFAULT_SECTOR_SIZE
    }

    /// Force written data to stable storage
    fn flush(&self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn path(&self) -> &Path;
}

/// Open flags for targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Use O_DIRECT (bypass page cache)
    pub direct: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self { direct: true }
    }
}

/// What the user named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    Path(PathBuf),
    /// Raw disk by kernel disk sequence number
    RawDisk(u64),
}

impl TargetSpec {
    /// A string of ASCII digits is a disk number; anything else is a path
    pub fn parse(arg: &str) -> Self {
        if !arg.is_empty() && arg.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(number) = arg.parse::<u64>() {
                return TargetSpec::RawDisk(number);
            }
        }
        TargetSpec::Path(PathBuf::from(arg))
    }

    /// Filesystem path this target resolves to
    pub fn path(&self) -> PathBuf {
        match self {
            TargetSpec::Path(path) => path.clone(),
            TargetSpec::RawDisk(number) => Path::new(DISKSEQ_DIR).join(number.to_string()),
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::Path(path) => write!(f, "{}", path.display()),
            TargetSpec::RawDisk(number) => write!(f, "disk {} ({})", number, self.path().display()),
        }
    }
}

/// Open the target `spec` names, picking the implementation by file type
pub fn open_target(spec: &TargetSpec, flags: OpenFlags) -> Result<Box<dyn Target>> {
    let path = spec.path();
    let metadata = std::fs::metadata(&path).map_err(|source| PreconditionError::TargetOpen {
        path: path.clone(),
        source,
    })?;

    let file_type = metadata.file_type();
    let mut target: Box<dyn Target> = if file_type.is_block_device() {
        Box::new(block::BlockTarget::new(path))
    } else if file_type.is_file() {
        Box::new(file::FileTarget::new(path))
    } else {
        return Err(PreconditionError::TargetOpen {
            path,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file or block device",
            ),
        }
        .into());
    };

    target.open(flags)?;
    Ok(target)
}

/// Largest multiple of `sector_size` not exceeding `size`
pub fn effective_size(size: u64, sector_size: u64) -> u64 {
    if sector_size == 0 {
        return size;
    }
    size - size % sector_size
}
