use crate::encoding::{Reader, Writer};
use crate::pdu::ReadFunction;
use crate::{DecodeError, EncodeError};

/// A read request: function code, start address and unit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub function: ReadFunction,
    pub start_address: u16,
    pub quantity: u16,
}

impl ReadRequest {
    /// Encoded size of every read request PDU.
    pub const LEN: usize = 5;

    pub const fn new(function: ReadFunction, start_address: u16, quantity: u16) -> Self {
        Self {
            function,
            start_address,
            quantity,
        }
    }

    fn quantity_is_valid(&self) -> bool {
        self.quantity != 0 && self.quantity <= self.function.max_quantity()
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if !self.quantity_is_valid() {
            return Err(EncodeError::ValueOutOfRange);
        }
        w.write_u8(self.function.as_u8())?;
        w.write_be_u16(self.start_address)?;
        w.write_be_u16(self.quantity)
    }

    /// Decodes a request PDU as seen by a server.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let function = ReadFunction::from_u8(r.read_u8()?)?;
        let request = Self {
            function,
            start_address: r.read_be_u16()?,
            quantity: r.read_be_u16()?,
        };
        if !request.quantity_is_valid() {
            return Err(DecodeError::InvalidValue);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::ReadRequest;
    use crate::encoding::{Reader, Writer};
    use crate::pdu::ReadFunction;
    use crate::{DecodeError, EncodeError};

    #[test]
    fn encodes_fc04() {
        let mut buf = [0u8; ReadRequest::LEN];
        let mut w = Writer::new(&mut buf);
        ReadRequest::new(ReadFunction::ReadInputRegisters, 0x0008, 1)
            .encode(&mut w)
            .unwrap();
        assert_eq!(w.as_written(), &[0x04, 0x00, 0x08, 0x00, 0x01]);
    }

    #[test]
    fn encode_enforces_per_function_limits() {
        let mut buf = [0u8; ReadRequest::LEN];
        let too_many_registers = ReadRequest::new(ReadFunction::ReadHoldingRegisters, 0, 126);
        assert_eq!(
            too_many_registers.encode(&mut Writer::new(&mut buf)).unwrap_err(),
            EncodeError::ValueOutOfRange
        );
        let zero = ReadRequest::new(ReadFunction::ReadCoils, 0, 0);
        assert_eq!(
            zero.encode(&mut Writer::new(&mut buf)).unwrap_err(),
            EncodeError::ValueOutOfRange
        );
        ReadRequest::new(ReadFunction::ReadCoils, 0, 2000)
            .encode(&mut Writer::new(&mut buf))
            .unwrap();
    }

    #[test]
    fn decodes_server_side() {
        let mut r = Reader::new(&[0x02, 0x00, 0xC4, 0x00, 0x16]);
        let request = ReadRequest::decode(&mut r).unwrap();
        assert_eq!(
            request,
            ReadRequest::new(ReadFunction::ReadDiscreteInputs, 0x00C4, 0x0016)
        );
        assert!(r.is_empty());
    }

    #[test]
    fn decode_rejects_write_functions() {
        let mut r = Reader::new(&[0x06, 0x00, 0x01, 0x00, 0x03]);
        assert_eq!(
            ReadRequest::decode(&mut r).unwrap_err(),
            DecodeError::InvalidFunctionCode
        );
    }
}
