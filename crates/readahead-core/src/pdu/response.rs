use crate::encoding::{Reader, Writer};
use crate::pdu::{ExceptionResponse, ReadFunction};
use crate::{DecodeError, EncodeError, UNIT_LEN};

/// Largest byte count a read response can carry (125 registers or 2000 bits).
const MAX_BYTE_COUNT: usize = 250;

/// Payload of a successful read: packed bits for coils and discrete inputs,
/// big-endian words for registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadResponse<'a> {
    pub function: ReadFunction,
    pub data: &'a [u8],
}

impl<'a> ReadResponse<'a> {
    fn decode_body(function: ReadFunction, r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let byte_count = usize::from(r.read_u8()?);
        if byte_count == 0 || byte_count > MAX_BYTE_COUNT {
            return Err(DecodeError::InvalidLength);
        }
        if !function.is_bit_access() && byte_count % 2 != 0 {
            return Err(DecodeError::InvalidLength);
        }
        let data = r.read_exact(byte_count)?;
        Ok(Self { function, data })
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if self.data.is_empty() || self.data.len() > MAX_BYTE_COUNT {
            return Err(EncodeError::InvalidLength);
        }
        if !self.function.is_bit_access() && self.data.len() % 2 != 0 {
            return Err(EncodeError::InvalidLength);
        }
        w.write_u8(self.function.as_u8())?;
        w.write_u8(self.data.len() as u8)?;
        w.write_all(self.data)
    }

    /// Number of units the payload can describe. For bit access this counts
    /// the padding bits of the last byte as well.
    pub fn unit_count(&self) -> usize {
        if self.function.is_bit_access() {
            self.data.len() * 8
        } else {
            self.data.len() / UNIT_LEN
        }
    }

    pub fn covers(&self, quantity: u16) -> bool {
        self.unit_count() >= usize::from(quantity)
    }

    pub fn register(&self, index: usize) -> Option<u16> {
        if self.function.is_bit_access() {
            return None;
        }
        let offset = index.checked_mul(UNIT_LEN)?;
        let bytes = self.data.get(offset..offset + UNIT_LEN)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn bit(&self, index: usize) -> Option<bool> {
        if !self.function.is_bit_access() {
            return None;
        }
        let byte = self.data.get(index / 8)?;
        Some(byte & (1u8 << (index % 8)) != 0)
    }

    /// Writes the first `quantity` units, two bytes each: register words
    /// as received, bits as `0x0000` or `0x0001`.
    pub fn write_units(&self, quantity: u16, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if !self.covers(quantity) {
            return Err(EncodeError::InvalidLength);
        }
        let count = usize::from(quantity);
        if !self.function.is_bit_access() {
            return w.write_all(&self.data[..count * UNIT_LEN]);
        }
        for index in 0..count {
            let set = self.bit(index).unwrap_or(false);
            w.write_be_u16(u16::from(set))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    Read(ReadResponse<'a>),
    Exception(ExceptionResponse),
}

impl<'a> Response<'a> {
    pub fn decode(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let function_byte = r.read_u8()?;
        if ReadFunction::is_exception(function_byte) {
            return Ok(Self::Exception(ExceptionResponse::decode_body(
                function_byte,
                r,
            )?));
        }
        let function = ReadFunction::from_u8(function_byte)?;
        Ok(Self::Read(ReadResponse::decode_body(function, r)?))
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::Read(resp) => resp.encode(w),
            Self::Exception(resp) => resp.encode(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReadResponse, Response};
    use crate::encoding::{Reader, Writer};
    use crate::pdu::{ExceptionCode, ReadFunction};
    use crate::{DecodeError, EncodeError};

    fn decode(bytes: &[u8]) -> Result<Response<'_>, DecodeError> {
        Response::decode(&mut Reader::new(bytes))
    }

    #[test]
    fn registers_are_copied_as_units() {
        let Response::Read(resp) = decode(&[0x03, 0x04, 0x12, 0x34, 0xAB, 0xCD]).unwrap() else {
            panic!("expected read response");
        };
        assert_eq!(resp.register(1), Some(0xABCD));
        assert_eq!(resp.bit(0), None);

        let mut buf = [0u8; 4];
        let mut w = Writer::new(&mut buf);
        resp.write_units(2, &mut w).unwrap();
        assert_eq!(w.as_written(), &[0x12, 0x34, 0xAB, 0xCD]);
    }

    #[test]
    fn bits_expand_to_one_word_each() {
        // coils 0, 2 and 8 set
        let Response::Read(resp) = decode(&[0x01, 0x02, 0b0000_0101, 0b0000_0001]).unwrap() else {
            panic!("expected read response");
        };
        assert_eq!(resp.unit_count(), 16);

        let mut buf = [0u8; 18];
        let mut w = Writer::new(&mut buf);
        resp.write_units(9, &mut w).unwrap();
        assert_eq!(
            w.as_written(),
            &[0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn write_units_rejects_short_payload() {
        let resp = ReadResponse {
            function: ReadFunction::ReadDiscreteInputs,
            data: &[0xFF],
        };
        let mut buf = [0u8; 32];
        assert_eq!(
            resp.write_units(9, &mut Writer::new(&mut buf)).unwrap_err(),
            EncodeError::InvalidLength
        );
    }

    #[test]
    fn odd_register_byte_count_is_rejected() {
        assert_eq!(
            decode(&[0x04, 0x03, 0x00, 0x01, 0x02]).unwrap_err(),
            DecodeError::InvalidLength
        );
    }

    #[test]
    fn exception_is_decoded() {
        match decode(&[0x83, 0x02]).unwrap() {
            Response::Exception(ex) => {
                assert_eq!(ex.function_code, 0x03);
                assert_eq!(ex.exception_code, ExceptionCode::IllegalDataAddress);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn non_read_function_is_rejected() {
        assert_eq!(
            decode(&[0x06, 0x00, 0x01, 0x00, 0x2A]).unwrap_err(),
            DecodeError::InvalidFunctionCode
        );
    }
}
