use core::fmt;
use crate::encoding::{Reader, Writer};
use crate::{DecodeError, EncodeError};

/// Reason a device gave for rejecting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    ServerDeviceFailure,
    Acknowledge,
    ServerDeviceBusy,
    GatewayPathUnavailable,
    GatewayTargetFailedToRespond,
    Unknown(u8),
}

const NAMED_CODES: [(u8, ExceptionCode, &str); 8] = [
    (0x01, ExceptionCode::IllegalFunction, "illegal function"),
    (0x02, ExceptionCode::IllegalDataAddress, "illegal data address"),
    (0x03, ExceptionCode::IllegalDataValue, "illegal data value"),
    (0x04, ExceptionCode::ServerDeviceFailure, "server device failure"),
    (0x05, ExceptionCode::Acknowledge, "acknowledge"),
    (0x06, ExceptionCode::ServerDeviceBusy, "server device busy"),
    (0x0A, ExceptionCode::GatewayPathUnavailable, "gateway path unavailable"),
    (0x0B, ExceptionCode::GatewayTargetFailedToRespond, "gateway target failed to respond"),
];

impl ExceptionCode {
    pub fn from_u8(value: u8) -> Self {
        NAMED_CODES
            .iter()
            .find(|(raw, _, _)| *raw == value)
            .map_or(Self::Unknown(value), |(_, code, _)| *code)
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Unknown(raw) => raw,
            named => NAMED_CODES
                .iter()
                .find(|(_, code, _)| *code == named)
                .map_or(0, |(raw, _, _)| *raw),
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match NAMED_CODES.iter().find(|(_, code, _)| code == self) {
            Some((raw, _, name)) => write!(f, "{name} (0x{raw:02X})"),
            None => write!(f, "unknown exception 0x{:02X}", self.as_u8()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    /// Function code of the rejected request, exception bit cleared.
    pub function_code: u8,
    pub exception_code: ExceptionCode,
}

impl ExceptionResponse {
    pub fn encode(&self, w: &mut Writer<'_>) -> Result<(), EncodeError> {
        w.write_u8(self.function_code | 0x80)?;
        w.write_u8(self.exception_code.as_u8())
    }

    /// Decode the body of an exception response whose function byte has
    /// already been consumed.
    pub fn decode(function_byte: u8, r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if (function_byte & 0x80) == 0 {
            return Err(DecodeError::InvalidFunctionCode);
        }
        Ok(Self {
            function_code: function_byte & 0x7F,
            exception_code: ExceptionCode::from_u8(r.read_u8()?),
        })
    }
}
