//! Block device target implementation
//!
//! Raw disks and partitions (e.g. /dev/nvme0n1, /dev/disk/by-diskseq/3).
//!
//! # Features
//!
//! - Detects device size via ioctl (BLKGETSIZE64)
//! - Detects logical sector size via ioctl (BLKSSZGET) for O_DIRECT alignment
//! - Re-reads the device size on demand to catch resizes during a run
//!
//! # Requirements
//!
//! - Root or appropriate permissions to access block devices
//! - Buffer alignment to the logical sector size (usually 512 or 4096 bytes)
//!
//! # Example
//!
//! ```no_run
//! use precondition::target::{Target, OpenFlags};
//! use precondition::target::block::BlockTarget;
//! use std::path::PathBuf;
//!
//! // Note: Requires root permissions
//! let mut target = BlockTarget::new(PathBuf::from("/dev/sdb"));
//! target.open(OpenFlags { direct: true })?;
//! let size = target.size(); // Device size in bytes
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

// ioctl request code for getting block device size
const BLKGETSIZE64: libc::c_ulong = 0x80081272;

/// Block device target
pub struct BlockTarget {
    /// Path to the block device (e.g., /dev/sda)
    path: PathBuf,

    /// Open handle (Some when open)
    device: Option<File>,

    /// Device size in bytes at open (via ioctl)
    device_size: u64,

    /// Logical sector size in bytes (via ioctl)
    sector_size: u64,
}

impl BlockTarget {
    /// Create a new block device target
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            device: None,
            device_size: 0,
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }

    fn raw_fd(&self) -> Result<RawFd> {
        self.device
            .as_ref()
            .map(|device| device.as_raw_fd())
            .ok_or_else(|| anyhow::anyhow!("Device not open: {}", self.path.display()))
    }

    /// Read the device size using ioctl
    fn detect_size(&self) -> Result<u64> {
        let fd = self.raw_fd()?;

        let mut size: u64 = 0;
        let result = unsafe { libc::ioctl(fd, BLKGETSIZE64, &mut size) };

        if result < 0 {
            return Err(PreconditionError::TargetSize {
                path: self.path.clone(),
                source: std::io::Error::last_os_error(),
            }
            .into());
        }

        Ok(size)
    }

    /// Logical sector size, falling back to 512 if the ioctl is refused
    fn detect_sector_size(&self) -> Result<u64> {
        let fd = self.raw_fd()?;

        let mut sector_size: libc::c_int = 0;
        let result = unsafe { libc::ioctl(fd, libc::BLKSSZGET, &mut sector_size) };

        if result == 0 && sector_size > 0 {
            Ok(sector_size as u64)
        } else {
            tracing::debug!(
                path = %self.path.display(),
                "BLKSSZGET failed, assuming {} byte sectors",
                DEFAULT_SECTOR_SIZE
            );
            Ok(DEFAULT_SECTOR_SIZE)
        }
    }
}

impl Target for BlockTarget {
    fn open(&mut self, flags: OpenFlags) -> Result<()> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);

        if flags.direct {
            options.custom_flags(libc::O_DIRECT);
        }

        let device = options.open(&self.path).map_err(|source| PreconditionError::TargetOpen {
            path: self.path.clone(),
            source,
        })?;
        self.device = Some(device);

        self.device_size = self.detect_size()?;
        self.sector_size = self.detect_sector_size()?;

        Ok(())
    }

    fn fd(&self) -> Result<RawFd> {
        self.raw_fd()
    }

    fn size(&self) -> u64 {
        self.device_size
    }

    fn query_size(&self) -> Result<u64> {
        self.detect_size()
    }

    fn logical_block_size(&self) -> u64 {
        self.sector_size
    }

    fn flush(&self) -> Result<()> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Device not open: {}", self.path.display()))?;
        device
            .sync_all()
            .map_err(|source| PreconditionError::Flush { source })?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.device = None;
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
