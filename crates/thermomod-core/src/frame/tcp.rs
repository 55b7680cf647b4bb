//! MBAP framing for Modbus TCP.

use crate::encoding::{Reader, Writer};
use crate::{DecodeError, EncodeError};

pub const MBAP_HEADER_LEN: usize = 7;
/// Largest PDU a Modbus TCP frame may carry.
pub const MAX_PDU_LEN: usize = 253;

const MODBUS_PROTOCOL_ID: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    /// Byte count of the unit id plus the PDU that follows the header.
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_be_u16(self.transaction_id)?;
        w.write_be_u16(MODBUS_PROTOCOL_ID)?;
        w.write_be_u16(self.length)?;
        w.write_u8(self.unit_id)
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let transaction_id = r.read_be_u16()?;
        if r.read_be_u16()? != MODBUS_PROTOCOL_ID {
            return Err(DecodeError::InvalidValue);
        }
        let length = r.read_be_u16()?;
        let unit_id = r.read_u8()?;
        if length < 2 {
            return Err(DecodeError::InvalidLength);
        }

        Ok(Self {
            transaction_id,
            length,
            unit_id,
        })
    }

    /// PDU length announced by the header.
    pub fn pdu_len(&self) -> usize {
        usize::from(self.length) - 1
    }
}

pub fn encode_frame(
    w: &mut Writer<'_>,
    transaction_id: u16,
    unit_id: u8,
    pdu: &[u8],
) -> Result<(), EncodeError> {
    if pdu.is_empty() || pdu.len() > MAX_PDU_LEN {
        return Err(EncodeError::ValueOutOfRange);
    }
    // MAX_PDU_LEN + 1 always fits in a u16
    let length = (pdu.len() + 1) as u16;

    MbapHeader {
        transaction_id,
        length,
        unit_id,
    }
    .encode(w)?;
    w.write_all(pdu)
}

pub fn decode_frame<'a>(r: &mut Reader<'a>) -> Result<(MbapHeader, &'a [u8]), DecodeError> {
    let header = MbapHeader::decode(r)?;
    let pdu = r.read_exact(header.pdu_len())?;
    Ok((header, pdu))
}
