use crate::encoding::{Reader, Writer};
use crate::pdu::{ExceptionResponse, FunctionCode, MAX_READ_REGISTERS};
use crate::{DecodeError, EncodeError};

/// Register payload of an FC03 response, still in wire byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadHoldingRegistersResponse<'a> {
    pub data: &'a [u8],
}

impl<'a> ReadHoldingRegistersResponse<'a> {
    fn decode_body(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let byte_count = usize::from(r.read_u8()?);
        if byte_count == 0 || byte_count % 2 != 0 || byte_count > usize::from(MAX_READ_REGISTERS) * 2
        {
            return Err(DecodeError::InvalidLength);
        }
        Ok(Self {
            data: r.read_exact(byte_count)?,
        })
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        let byte_count: u8 = self
            .data
            .len()
            .try_into()
            .map_err(|_| EncodeError::ValueOutOfRange)?;
        w.write_u8(FunctionCode::ReadHoldingRegisters.as_u8())?;
        w.write_u8(byte_count)?;
        w.write_all(self.data)
    }

    /// Encode a response directly from register values.
    pub fn encode_registers(values: &[u16], w: &mut Writer<'_>) -> Result<(), EncodeError> {
        if values.is_empty() || values.len() > usize::from(MAX_READ_REGISTERS) {
            return Err(EncodeError::ValueOutOfRange);
        }
        w.write_u8(FunctionCode::ReadHoldingRegisters.as_u8())?;
        // at most 250 bytes, checked above
        w.write_u8((values.len() * 2) as u8)?;
        for value in values {
            w.write_be_u16(*value)?;
        }
        Ok(())
    }

    pub fn register_count(&self) -> usize {
        self.data.len() / 2
    }

    pub fn register(&self, index: usize) -> Option<u16> {
        let offset = index.checked_mul(2)?;
        let bytes = self.data.get(offset..offset.checked_add(2)?)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn registers(&self) -> impl Iterator<Item = u16> + 'a {
        self.data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    ReadHoldingRegisters(ReadHoldingRegistersResponse<'a>),
    Exception(ExceptionResponse),
}

impl<'a> Response<'a> {
    pub fn decode(r: &mut Reader<'a>) -> Result<Self, DecodeError> {
        let function = r.read_u8()?;
        if FunctionCode::is_exception(function) {
            return Ok(Self::Exception(ExceptionResponse::decode(function, r)?));
        }

        match FunctionCode::from_u8(function) {
            FunctionCode::ReadHoldingRegisters => Ok(Self::ReadHoldingRegisters(
                ReadHoldingRegistersResponse::decode_body(r)?,
            )),
            FunctionCode::Other(code) => Err(DecodeError::Unsupported(code)),
        }
    }

    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        match self {
            Self::ReadHoldingRegisters(resp) => resp.encode(w),
            Self::Exception(ex) => ex.encode(w),
        }
    }
}
