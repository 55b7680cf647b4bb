//! Modbus holding-register client.

#![forbid(unsafe_code)]

pub mod sync;

pub use sync::{SyncClientError, SyncModbusTcpClient};

use std::time::Duration;
use thermomod_core::encoding::{Reader, Writer};
use thermomod_core::frame::tcp::MAX_PDU_LEN;
use thermomod_core::pdu::{ExceptionResponse, ReadHoldingRegistersRequest, Response};
use thermomod_core::{DecodeError, EncodeError};
use thermomod_datalink::{DataLink, DataLinkError};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Upper bound for one request/response exchange, also applied to
    /// connection establishment by the blocking client.
    pub response_timeout: Duration,
    /// Extra attempts after a transport error or timeout. Exception
    /// responses and malformed payloads are never retried.
    pub retry_count: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
            retry_count: 3,
        }
    }
}

impl ClientConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u8) -> Self {
        self.retry_count = retry_count;
        self
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("link: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("request encode: {0}")]
    Encode(#[from] EncodeError),
    #[error("response decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("no response within the timeout")]
    Timeout,
    #[error(
        "device rejected function 0x{:02X}: {}",
        .0.function_code,
        .0.exception_code
    )]
    Exception(ExceptionResponse),
    #[error("unexpected response: {0}")]
    InvalidResponse(&'static str),
}

/// Errors worth another attempt: the request may never have reached the
/// device, or its answer got lost.
fn is_transient(err: &DataLinkError) -> bool {
    matches!(
        err,
        DataLinkError::Io(_) | DataLinkError::Timeout | DataLinkError::ConnectionClosed
    )
}

/// Pull exactly `quantity` registers out of a response PDU.
fn registers_from_pdu(pdu: &[u8], quantity: u16) -> Result<Vec<u16>, ClientError> {
    let mut reader = Reader::new(pdu);
    let response = Response::decode(&mut reader)?;
    if !reader.is_empty() {
        return Err(ClientError::InvalidResponse("trailing bytes in response"));
    }
    match response {
        Response::Exception(exception) => Err(ClientError::Exception(exception)),
        Response::ReadHoldingRegisters(data) if data.register_count() == usize::from(quantity) => {
            Ok(data.registers().collect())
        }
        Response::ReadHoldingRegisters(_) => Err(ClientError::InvalidResponse(
            "register count differs from request",
        )),
    }
}

/// Holding-register client over any [`DataLink`], with a per-attempt
/// response timeout and bounded retries for transient link errors.
pub struct ModbusClient<D: DataLink> {
    datalink: D,
    config: ClientConfig,
}

impl<D: DataLink> ModbusClient<D> {
    pub fn new(datalink: D) -> Self {
        Self::with_config(datalink, ClientConfig::default())
    }

    pub fn with_config(datalink: D, config: ClientConfig) -> Self {
        Self { datalink, config }
    }

    pub fn config(&self) -> ClientConfig {
        self.config
    }

    async fn exchange(
        &self,
        unit_id: u8,
        request_pdu: &[u8],
        response_pdu: &mut [u8],
    ) -> Result<usize, ClientError> {
        let mut retries = 0u8;
        loop {
            let outcome = timeout(
                self.config.response_timeout,
                self.datalink.exchange(unit_id, request_pdu, response_pdu),
            )
            .await;

            let err = match outcome {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(err)) if is_transient(&err) => ClientError::DataLink(err),
                Ok(Err(err)) => return Err(ClientError::DataLink(err)),
                Err(_) => ClientError::Timeout,
            };
            if retries >= self.config.retry_count {
                return Err(err);
            }
            retries += 1;
            warn!(unit_id, retry = retries, error = %err, "repeating request");
        }
    }

    /// Read `quantity` holding registers starting at `start` from `unit_id`.
    /// On success the vector holds exactly `quantity` values.
    pub async fn read_holding_registers(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, ClientError> {
        let mut request = [0u8; ReadHoldingRegistersRequest::ENCODED_LEN];
        let mut writer = Writer::new(&mut request);
        ReadHoldingRegistersRequest {
            start_address: start,
            quantity,
        }
        .encode(&mut writer)?;

        let mut response = [0u8; MAX_PDU_LEN];
        let len = self
            .exchange(unit_id, writer.as_written(), &mut response)
            .await?;
        let registers = registers_from_pdu(&response[..len], quantity)?;
        debug!(unit_id, start, ?registers, "holding registers read");
        Ok(registers)
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        Ok(self.datalink.close().await?)
    }
}
