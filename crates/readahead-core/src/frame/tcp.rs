//! Modbus TCP application protocol (MBAP) framing.

use crate::encoding::{Reader, Writer};
use crate::pdu::MAX_PDU_LEN;
use crate::{DecodeError, EncodeError};

pub const MBAP_HEADER_LEN: usize = 7;

/// Largest complete Modbus TCP frame.
pub const MAX_FRAME_LEN: usize = MBAP_HEADER_LEN + MAX_PDU_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    /// Unit id byte plus PDU length.
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn for_pdu(transaction_id: u16, unit_id: u8, pdu_len: usize) -> Result<Self, EncodeError> {
        if pdu_len == 0 || pdu_len > MAX_PDU_LEN {
            return Err(EncodeError::InvalidLength);
        }
        Ok(Self {
            transaction_id,
            protocol_id: 0,
            length: pdu_len as u16 + 1,
            unit_id,
        })
    }

    /// Length of the PDU following the header.
    pub fn pdu_len(&self) -> usize {
        usize::from(self.length).saturating_sub(1)
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_be_u16(self.transaction_id)?;
        w.write_be_u16(self.protocol_id)?;
        w.write_be_u16(self.length)?;
        w.write_u8(self.unit_id)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let header = Self {
            transaction_id: r.read_be_u16()?,
            protocol_id: r.read_be_u16()?,
            length: r.read_be_u16()?,
            unit_id: r.read_u8()?,
        };
        if header.protocol_id != 0 {
            return Err(DecodeError::InvalidValue);
        }
        if header.length < 2 {
            return Err(DecodeError::InvalidLength);
        }
        Ok(header)
    }
}

pub fn encode_frame(
    w: &mut Writer<'_>,
    transaction_id: u16,
    unit_id: u8,
    pdu: &[u8],
) -> Result<(), EncodeError> {
    MbapHeader::for_pdu(transaction_id, unit_id, pdu.len())?.encode(w)?;
    w.write_all(pdu)
}

pub fn decode_frame<'a>(r: &mut Reader<'a>) -> Result<(MbapHeader, &'a [u8]), DecodeError> {
    let header = MbapHeader::decode(r)?;
    let pdu = r.read_exact(header.pdu_len())?;
    Ok((header, pdu))
}
