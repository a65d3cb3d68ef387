//! Operation slots
//!
//! A slot is one position in the fixed window of outstanding IOs. Its index is
//! the `user_data` of the operation it carries, so a completion finds its own
//! offset, length and direction without any lookup structure. Slots are
//! reused in place for the whole run.

use crate::engine::OperationType;
use crate::util::buffer::AlignedBuffer;
use crate::Result;

pub struct OperationSlot {
    pub offset: u64,
    pub length: usize,
    pub op_type: OperationType,
    pub in_flight: bool,
    /// Destination of reads; absent when the run never reads
    read_buffer: Option<AlignedBuffer>,
}

impl OperationSlot {
    /// Create an idle slot, with a read buffer of `read_size` bytes if given
    pub fn new(read_size: Option<usize>, alignment: usize) -> Result<Self> {
        let read_buffer = match read_size {
            Some(size) => {
                let mut buffer = AlignedBuffer::new(size, alignment)?;
                // Stale data in a read buffer stands out in a debugger
                if cfg!(debug_assertions) {
                    buffer.fill(0xFF);
                }
                Some(buffer)
            }
            None => None,
        };

        Ok(Self {
            offset: 0,
            length: 0,
            op_type: OperationType::Write,
            in_flight: false,
            read_buffer,
        })
    }

    /// Pointer to the slot's read buffer
    pub fn read_ptr(&mut self) -> Option<*mut u8> {
        self.read_buffer.as_mut().map(|buffer| buffer.as_mut_ptr())
    }

    pub fn read_buffer(&self) -> Option<&AlignedBuffer> {
        self.read_buffer.as_ref()
    }
}
