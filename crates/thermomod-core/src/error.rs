use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The destination buffer cannot hold the encoded bytes.
    BufferTooSmall,
    /// A field value the protocol cannot represent.
    ValueOutOfRange,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BufferTooSmall => "output buffer too small",
            Self::ValueOutOfRange => "field value not encodable",
        })
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    UnexpectedEof,
    InvalidFunctionCode,
    InvalidLength,
    InvalidValue,
    /// Well-formed PDU with a function code this codec does not handle.
    Unsupported(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => f.write_str("input ended mid-field"),
            Self::InvalidFunctionCode => f.write_str("function code not valid here"),
            Self::InvalidLength => f.write_str("length field disagrees with payload"),
            Self::InvalidValue => f.write_str("field value out of range"),
            Self::Unsupported(code) => write!(f, "function code 0x{code:02X} not supported"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}
