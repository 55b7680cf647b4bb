//! Async Modbus TCP link to a sensor, plus an in-process simulated device.

#![forbid(unsafe_code)]

use async_trait::async_trait;
use thermomod_core::{DecodeError, EncodeError};
use thiserror::Error;

pub mod server;
pub mod sim;
pub mod tcp;

pub use server::{ModbusService, ModbusTcpServer, ServiceError};
pub use sim::{HoldingRegisterBank, InMemoryModbusService};
pub use tcp::ModbusTcpTransport;

#[derive(Debug, Error)]
pub enum DataLinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("frame decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("peer closed the connection")]
    ConnectionClosed,
    #[error("timed out")]
    Timeout,
    #[error("unexpected response: {0}")]
    InvalidResponse(&'static str),
    #[error("response for transaction {got} while waiting for {expected}")]
    MismatchedTransactionId { expected: u16, got: u16 },
    #[error("response pdu of {needed} bytes does not fit in {available}")]
    ResponseBufferTooSmall { needed: usize, available: usize },
}

/// One request/response round trip with a unit on the link.
#[async_trait]
pub trait DataLink: Send + Sync {
    /// Writes the response PDU into `response_pdu` and returns its length.
    async fn exchange(
        &self,
        unit_id: u8,
        request_pdu: &[u8],
        response_pdu: &mut [u8],
    ) -> Result<usize, DataLinkError>;

    async fn close(&self) -> Result<(), DataLinkError> {
        Ok(())
    }
}
