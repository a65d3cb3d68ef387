//! Aligned buffers for direct IO
//!
//! O_DIRECT requires the user buffer to be aligned to the device's logical
//! sector size. A run allocates one shared write payload and one read buffer
//! per operation slot up front; nothing is allocated in the hot path.

use super::random::RandomSource;
use crate::Result;
use anyhow::Context;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr;

/// Memory-aligned buffer suitable for O_DIRECT operations
///
/// The memory is zero-initialised on allocation so the buffer can always be
/// viewed as a byte slice.
pub struct AlignedBuffer {
    ptr: *mut u8,
    size: usize,
    alignment: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate `size` bytes aligned to `alignment`
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero, `alignment` is not a power of two,
    /// or the allocator fails.
    pub fn new(size: usize, alignment: usize) -> Result<Self> {
        if size == 0 {
            anyhow::bail!("Buffer size must be greater than 0");
        }
        if !alignment.is_power_of_two() {
            anyhow::bail!("Alignment must be a power of 2 (got {})", alignment);
        }

        let layout = Layout::from_size_align(size, alignment)
            .with_context(|| format!("Invalid buffer layout: size={}, alignment={}", size, alignment))?;

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            anyhow::bail!("Failed to allocate {} byte aligned buffer", size);
        }

        Ok(AlignedBuffer {
            ptr,
            size,
            alignment,
            layout,
        })
    }

    /// Get a raw pointer to the buffer
    #[inline(always)]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Get a mutable raw pointer to the buffer
    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// Get the buffer as a slice
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// Get the buffer as a mutable slice
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }

    /// Get the size of the buffer in bytes
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the alignment of the buffer
    #[inline(always)]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Verify that the buffer is properly aligned
    #[inline(always)]
    pub fn is_aligned(&self) -> bool {
        (self.ptr as usize) % self.alignment == 0
    }

    /// Set every byte to `value`
    pub fn fill(&mut self, value: u8) {
        unsafe { ptr::write_bytes(self.ptr, value, self.size) };
    }

    /// Overwrite the whole buffer with random bytes
    pub fn fill_random(&mut self, rng: &mut RandomSource) {
        rng.fill_bytes(self.as_mut_slice());
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

// AlignedBuffer is Send because it owns its memory
unsafe impl Send for AlignedBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_buffer_creation() {
        let buffer = AlignedBuffer::new(4096, 512).unwrap();
        assert_eq!(buffer.size(), 4096);
        assert_eq!(buffer.alignment(), 512);
        assert!(buffer.is_aligned());
    }

    #[test]
    fn test_aligned_buffer_4k_alignment() {
        let buffer = AlignedBuffer::new(8192, 4096).unwrap();
        assert!(buffer.is_aligned());
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_alignment() {
        let err = AlignedBuffer::new(4096, 513).err().unwrap();
        assert!(err.to_string().contains("power of 2"));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(AlignedBuffer::new(0, 512).is_err());
    }

    #[test]
    fn test_buffer_fill() {
        let mut buffer = AlignedBuffer::new(1024, 512).unwrap();
        buffer.fill(0xFF);
        assert!(buffer.as_slice().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_buffer_fill_random_is_seeded() {
        let mut a = AlignedBuffer::new(4096, 512).unwrap();
        let mut b = AlignedBuffer::new(4096, 512).unwrap();

        a.fill_random(&mut RandomSource::with_seed(42));
        b.fill_random(&mut RandomSource::with_seed(42));

        assert_eq!(a.as_slice(), b.as_slice());
        assert!(a.as_slice().iter().any(|&byte| byte != 0));
    }
}
