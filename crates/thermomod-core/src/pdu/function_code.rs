#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadHoldingRegisters,
    /// Any code this crate does not interpret. Servers answer these with
    /// an illegal-function exception.
    Other(u8),
}

impl FunctionCode {
    const EXCEPTION_BIT: u8 = 0x80;

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => 0x03,
            Self::Other(code) => code,
        }
    }

    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x03 => Self::ReadHoldingRegisters,
            other => Self::Other(other),
        }
    }

    pub const fn is_exception(value: u8) -> bool {
        (value & Self::EXCEPTION_BIT) != 0
    }

    pub const fn exception_of(self) -> u8 {
        self.as_u8() | Self::EXCEPTION_BIT
    }
}
