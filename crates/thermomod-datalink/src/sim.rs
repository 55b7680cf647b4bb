//! In-memory holding-register device used by tests and the `simsensor` tool.

use crate::{ModbusService, ServiceError};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thermomod_core::encoding::Writer;
use thermomod_core::pdu::{DecodedRequest, ExceptionCode, ReadHoldingRegistersResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldingRegisterBank {
    values: Vec<u16>,
}

impl HoldingRegisterBank {
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0u16; size],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, address: u16) -> Option<u16> {
        self.values.get(usize::from(address)).copied()
    }

    pub fn set(&mut self, address: u16, value: u16) -> Result<(), ServiceError> {
        let slot = self
            .values
            .get_mut(usize::from(address))
            .ok_or(ServiceError::InvalidRequest("register address out of range"))?;
        *slot = value;
        Ok(())
    }

    fn window(&self, start: u16, quantity: u16) -> Option<&[u16]> {
        let start = usize::from(start);
        self.values.get(start..start.checked_add(usize::from(quantity))?)
    }
}

/// A single simulated device exposing a bank of holding registers.
///
/// Only Read Holding Registers is served. Every other function code is
/// answered with an illegal-function exception. [`set_device_failure`]
/// makes every request fail with a server-device-failure exception, which
/// is how tests provoke protocol faults.
///
/// [`set_device_failure`]: InMemoryModbusService::set_device_failure
#[derive(Debug)]
pub struct InMemoryModbusService {
    registers: RwLock<HoldingRegisterBank>,
    device_failure: AtomicBool,
    reads_served: AtomicU64,
}

impl InMemoryModbusService {
    pub fn new(register_count: usize) -> Self {
        Self::with_bank(HoldingRegisterBank::new(register_count))
    }

    pub fn with_bank(bank: HoldingRegisterBank) -> Self {
        Self {
            registers: RwLock::new(bank),
            device_failure: AtomicBool::new(false),
            reads_served: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> HoldingRegisterBank {
        self.registers
            .read()
            .expect("holding register bank lock poisoned")
            .clone()
    }

    pub fn set_holding_register(&self, address: u16, value: u16) -> Result<(), ServiceError> {
        self.registers
            .write()
            .expect("holding register bank lock poisoned")
            .set(address, value)
    }

    pub fn holding_register(&self, address: u16) -> Option<u16> {
        self.registers
            .read()
            .expect("holding register bank lock poisoned")
            .get(address)
    }

    pub fn set_device_failure(&self, failing: bool) {
        self.device_failure.store(failing, Ordering::Relaxed);
    }

    /// Number of successful register reads answered so far.
    pub fn reads_served(&self) -> u64 {
        self.reads_served.load(Ordering::Relaxed)
    }
}

impl ModbusService for InMemoryModbusService {
    fn handle(
        &self,
        _unit_id: u8,
        request: DecodedRequest,
        response_pdu: &mut [u8],
    ) -> Result<usize, ServiceError> {
        if self.device_failure.load(Ordering::Relaxed) {
            return Err(ServiceError::Exception(ExceptionCode::ServerDeviceFailure));
        }

        let DecodedRequest::ReadHoldingRegisters(req) = request else {
            return Err(ServiceError::Exception(ExceptionCode::IllegalFunction));
        };

        let bank = self
            .registers
            .read()
            .expect("holding register bank lock poisoned");
        let values = bank
            .window(req.start_address, req.quantity)
            .ok_or(ServiceError::Exception(ExceptionCode::IllegalDataAddress))?;

        let mut w = Writer::new(response_pdu);
        ReadHoldingRegistersResponse::encode_registers(values, &mut w)
            .map_err(|_| ServiceError::Internal("response buffer too small"))?;
        self.reads_served.fetch_add(1, Ordering::Relaxed);
        Ok(w.as_written().len())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryModbusService;
    use crate::{ModbusService, ServiceError};
    use thermomod_core::pdu::{DecodedRequest, ExceptionCode, ReadHoldingRegistersRequest};

    fn poll(start_address: u16, quantity: u16) -> DecodedRequest {
        DecodedRequest::ReadHoldingRegisters(ReadHoldingRegistersRequest {
            start_address,
            quantity,
        })
    }

    #[test]
    fn serves_register_window() {
        let service = InMemoryModbusService::new(4);
        service.set_holding_register(1, 235).unwrap();
        service.set_holding_register(2, 7).unwrap();

        let mut out = [0u8; 16];
        let len = service.handle(1, poll(1, 2), &mut out).unwrap();
        assert_eq!(&out[..len], &[0x03, 0x04, 0x00, 0xEB, 0x00, 0x07]);
        assert_eq!(service.reads_served(), 1);
    }

    #[test]
    fn window_past_bank_is_illegal_address() {
        let service = InMemoryModbusService::new(2);
        let mut out = [0u8; 16];
        let err = service.handle(1, poll(1, 2), &mut out).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Exception(ExceptionCode::IllegalDataAddress)
        ));
        assert_eq!(service.reads_served(), 0);
    }

    #[test]
    fn device_failure_overrides_reads() {
        let service = InMemoryModbusService::new(4);
        service.set_device_failure(true);
        let mut out = [0u8; 16];
        let err = service.handle(1, poll(0, 1), &mut out).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Exception(ExceptionCode::ServerDeviceFailure)
        ));

        service.set_device_failure(false);
        assert!(service.handle(1, poll(0, 1), &mut out).is_ok());
    }

    #[test]
    fn other_functions_are_illegal() {
        let service = InMemoryModbusService::new(4);
        let mut out = [0u8; 16];
        let err = service
            .handle(1, DecodedRequest::Unsupported(0x06), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Exception(ExceptionCode::IllegalFunction)
        ));
    }

    #[test]
    fn out_of_range_set_is_rejected() {
        let service = InMemoryModbusService::new(2);
        assert!(service.set_holding_register(2, 1).is_err());
        assert_eq!(service.snapshot().len(), 2);
    }
}
