use crate::config::DeviceEndpoint;
use thermomod_client::{SyncClientError, SyncModbusTcpClient};
use tracing::{debug, warn};

/// Blocking register access used by one poll cycle.
pub trait RegisterLink {
    fn read_holding_registers(
        &mut self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, SyncClientError>;

    /// Release the connection. Errors are logged, not surfaced.
    fn close(&mut self);
}

pub trait LinkConnector {
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn RegisterLink>, SyncClientError>;
}

/// Opens Modbus TCP connections with the endpoint's timeout and retry policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpLinkConnector;

impl LinkConnector for TcpLinkConnector {
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn RegisterLink>, SyncClientError> {
        let address = endpoint.address();
        let client = SyncModbusTcpClient::connect_with_config(&address, endpoint.client_config())?;
        debug!(%address, "modbus tcp link open");
        Ok(Box::new(TcpRegisterLink { client, address }))
    }
}

struct TcpRegisterLink {
    client: SyncModbusTcpClient,
    address: String,
}

impl RegisterLink for TcpRegisterLink {
    fn read_holding_registers(
        &mut self,
        unit_id: u8,
        start: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, SyncClientError> {
        self.client.read_holding_registers(unit_id, start, quantity)
    }

    fn close(&mut self) {
        match self.client.close() {
            Ok(()) => debug!(address = %self.address, "modbus tcp link closed"),
            Err(err) => warn!(address = %self.address, error = %err, "modbus tcp close failed"),
        }
    }
}
