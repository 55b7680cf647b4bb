use crate::encoding::{Reader, Writer};
use crate::pdu::FunctionCode;
use crate::{DecodeError, EncodeError};

/// Largest register count a single FC03 request may ask for.
pub const MAX_READ_REGISTERS: u16 = 125;

const fn quantity_in_range(quantity: u16) -> bool {
    quantity != 0 && quantity <= MAX_READ_REGISTERS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegistersRequest {
    pub start_address: u16,
    pub quantity: u16,
}

impl ReadHoldingRegistersRequest {
    pub const ENCODED_LEN: usize = 5;

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if !quantity_in_range(self.quantity) {
            return Err(EncodeError::ValueOutOfRange);
        }
        w.write_u8(FunctionCode::ReadHoldingRegisters.as_u8())?;
        w.write_be_u16(self.start_address)?;
        w.write_be_u16(self.quantity)
    }

    fn decode_body(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let start_address = r.read_be_u16()?;
        let quantity = r.read_be_u16()?;
        if !quantity_in_range(quantity) {
            return Err(DecodeError::InvalidValue);
        }
        Ok(Self {
            start_address,
            quantity,
        })
    }

    /// Register addresses covered by this request, or `None` when the range
    /// runs past the 16-bit address space.
    pub fn address_range(&self) -> Option<core::ops::Range<u32>> {
        let start = u32::from(self.start_address);
        let end = start + u32::from(self.quantity);
        (end <= 0x1_0000).then_some(start..end)
    }
}

/// A request PDU as seen by a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedRequest {
    ReadHoldingRegisters(ReadHoldingRegistersRequest),
    /// A well-formed PDU carrying a function code this crate does not serve.
    Unsupported(u8),
}

impl DecodedRequest {
    /// Decode a complete request PDU. Trailing bytes after a known request
    /// are rejected.
    pub fn decode(pdu: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(pdu);
        let function = r.read_u8()?;
        if FunctionCode::is_exception(function) {
            return Err(DecodeError::InvalidFunctionCode);
        }

        match FunctionCode::from_u8(function) {
            FunctionCode::ReadHoldingRegisters => {
                let request = ReadHoldingRegistersRequest::decode_body(&mut r)?;
                if !r.is_empty() {
                    return Err(DecodeError::InvalidLength);
                }
                Ok(Self::ReadHoldingRegisters(request))
            }
            FunctionCode::Other(code) => Ok(Self::Unsupported(code)),
        }
    }

    pub fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Self::Unsupported(code) => FunctionCode::Other(*code),
        }
    }
}
