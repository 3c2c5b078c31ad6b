//! Protocol data units for the four Modbus read functions.

pub mod exception;
pub mod function_code;
pub mod request;
pub mod response;

pub use exception::{ExceptionCode, ExceptionResponse};
pub use function_code::ReadFunction;
pub use request::ReadRequest;
pub use response::{ReadResponse, Response};

/// Largest PDU a Modbus TCP frame may carry.
pub const MAX_PDU_LEN: usize = 253;
