//! Blocking front-end for callers that run on their own thread, such as a
//! cooperative reactor that must not await.

use crate::{ClientConfig, ClientError, ModbusClient};
use thermomod_datalink::{DataLinkError, ModbusTcpTransport};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SyncClientError {
    #[error("runtime init error: {0}")]
    RuntimeInit(std::io::Error),
    #[error("datalink error: {0}")]
    DataLink(#[from] DataLinkError),
    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

pub struct SyncModbusTcpClient {
    runtime: Runtime,
    client: ModbusClient<ModbusTcpTransport>,
}

impl SyncModbusTcpClient {
    pub fn connect(addr: &str) -> Result<Self, SyncClientError> {
        Self::connect_with_config(addr, ClientConfig::default())
    }

    /// Open a connection, waiting at most `config.response_timeout` for the
    /// peer to accept it.
    pub fn connect_with_config(addr: &str, config: ClientConfig) -> Result<Self, SyncClientError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SyncClientError::RuntimeInit)?;
        let link = runtime.block_on(ModbusTcpTransport::connect_timeout(
            addr,
            config.response_timeout,
        ))?;
        debug!(addr, ?config, "modbus tcp client connected");
        let client = ModbusClient::with_config(link, config);
        Ok(Self { runtime, client })
    }

    pub fn config(&self) -> ClientConfig {
        self.client.config()
    }

    pub fn read_holding_registers(
        &self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, SyncClientError> {
        self.runtime
            .block_on(self.client.read_holding_registers(unit_id, start, quantity))
            .map_err(SyncClientError::Client)
    }

    pub fn close(&self) -> Result<(), SyncClientError> {
        self.runtime
            .block_on(self.client.close())
            .map_err(SyncClientError::Client)
    }
}
