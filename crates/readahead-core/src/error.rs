use core::fmt;

/// Errors raised while encoding into a caller-owned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    BufferTooSmall,
    ValueOutOfRange,
    InvalidLength,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::BufferTooSmall => "buffer too small",
            Self::ValueOutOfRange => "value out of range",
            Self::InvalidLength => "invalid length",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

/// Errors raised while decoding frames and PDUs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnexpectedEof,
    InvalidFunctionCode,
    InvalidLength,
    InvalidValue,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::UnexpectedEof => "unexpected end of input",
            Self::InvalidFunctionCode => "invalid function code",
            Self::InvalidLength => "invalid length",
            Self::InvalidValue => "invalid value",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}
