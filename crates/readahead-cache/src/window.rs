use crate::error::WindowError;
use readahead_core::UNIT_LEN;

/// One contiguous range of units fetched in a single request, with its raw
/// payload. Unit `i` (counted from `start_address`) occupies payload bytes
/// `2i..2i + 2`.
///
/// Windows are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    start_address: u16,
    length: u16,
    payload: Vec<u8>,
}

impl Window {
    pub fn new(start_address: u16, length: u16, payload: Vec<u8>) -> Result<Self, WindowError> {
        if length == 0 {
            return Err(WindowError::Empty);
        }
        let expected = usize::from(length) * UNIT_LEN;
        if payload.len() != expected {
            return Err(WindowError::PayloadLength {
                expected,
                actual: payload.len(),
            });
        }
        if u32::from(start_address) + u32::from(length) > crate::ADDRESS_SPACE {
            return Err(WindowError::AddressOverflow {
                start: start_address,
                length,
            });
        }
        Ok(Self {
            start_address,
            length,
            payload,
        })
    }

    pub fn start_address(&self) -> u16 {
        self.start_address
    }

    /// Number of units covered.
    pub fn len(&self) -> u16 {
        self.length
    }

    /// Always false; a window covers at least one unit.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Address of the last unit covered.
    pub fn end_address(&self) -> u16 {
        self.start_address + (self.length - 1)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True when every unit of `address..address + quantity` lies inside the
    /// window. A zero `quantity` is never contained.
    pub fn contains(&self, address: u16, quantity: u16) -> bool {
        if quantity == 0 {
            return false;
        }
        let first = u32::from(address);
        let last = first + u32::from(quantity) - 1;
        first >= u32::from(self.start_address) && last <= u32::from(self.end_address())
    }

    /// Borrows the payload bytes of `quantity` units starting at `address`.
    pub fn read(&self, address: u16, quantity: u16) -> Result<&[u8], WindowError> {
        if !self.contains(address, quantity) {
            return Err(WindowError::OutOfRange {
                address,
                quantity,
                start: self.start_address,
                length: self.length,
            });
        }
        let offset = usize::from(address - self.start_address) * UNIT_LEN;
        let len = usize::from(quantity) * UNIT_LEN;
        Ok(&self.payload[offset..offset + len])
    }
}
