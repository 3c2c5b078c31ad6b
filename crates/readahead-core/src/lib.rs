//! Modbus read-function encoding and framing.
//!
//! `readahead-core` covers the four read function codes (coils, discrete
//! inputs, holding registers, input registers): request and response PDUs,
//! exception responses and Modbus TCP framing. It allocates nothing and builds
//! without `std` when the default feature is disabled.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

pub mod encoding;
pub mod error;
pub mod frame;
pub mod pdu;

pub use error::{DecodeError, EncodeError};
pub use pdu::ReadFunction;

/// Bytes occupied by one addressable unit once expanded by
/// [`pdu::ReadResponse::write_units`].
pub const UNIT_LEN: usize = 2;
