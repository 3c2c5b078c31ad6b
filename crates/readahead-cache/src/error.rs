use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error(
        "range {address}+{quantity} is outside the window of {length} units at {start}"
    )]
    OutOfRange {
        address: u16,
        quantity: u16,
        start: u16,
        length: u16,
    },
    #[error("window must cover at least one unit")]
    Empty,
    #[error("window payload is {actual} bytes, expected {expected}")]
    PayloadLength { expected: usize, actual: usize },
    #[error("window starting at {start} with {length} units passes the end of the address space")]
    AddressOverflow { start: u16, length: u16 },
}

/// Failure of a read served through [`ReadAhead`](crate::ReadAhead).
///
/// `E` is the error type of the underlying [`UnitSource`](crate::UnitSource);
/// source failures are carried unchanged in [`ReadAheadError::Source`].
#[derive(Debug, Error)]
pub enum ReadAheadError<E> {
    #[error("invalid range: {quantity} units at address {address}")]
    InvalidRange { address: u16, quantity: u16 },
    #[error("unsupported function code 0x{0:02X}")]
    UnsupportedFunction(u8),
    #[error("data length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("source error: {0}")]
    Source(#[source] E),
}

impl<E> ReadAheadError<E> {
    /// The source's own error, if that is what failed.
    pub fn source_error(&self) -> Option<&E> {
        match self {
            Self::Source(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_source_error(self) -> Option<E> {
        match self {
            Self::Source(err) => Some(err),
            _ => None,
        }
    }
}
