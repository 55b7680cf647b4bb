use std::sync::Arc;
use thermomod_core::encoding::Reader;
use thermomod_core::pdu::{ExceptionCode, Response};
use thermomod_datalink::{DataLink, InMemoryModbusService, ModbusTcpServer, ModbusTcpTransport};

#[tokio::test]
async fn transport_reads_simulated_temperature() {
    let service = Arc::new(InMemoryModbusService::new(8));
    service.set_holding_register(1, 235).unwrap();

    let server = ModbusTcpServer::bind("127.0.0.1:0", Arc::clone(&service))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let server_task = tokio::spawn(server.run());

    let transport = ModbusTcpTransport::connect(addr).await.unwrap();
    let mut response = [0u8; 260];
    let len = transport
        .exchange(1, &[0x03, 0x00, 0x01, 0x00, 0x02], &mut response)
        .await
        .unwrap();

    let mut r = Reader::new(&response[..len]);
    match Response::decode(&mut r).unwrap() {
        Response::ReadHoldingRegisters(resp) => {
            assert_eq!(resp.register(0), Some(235));
            assert_eq!(resp.register(1), Some(0));
        }
        other => panic!("unexpected response: {other:?}"),
    }

    service.set_device_failure(true);
    let len = transport
        .exchange(1, &[0x03, 0x00, 0x01, 0x00, 0x02], &mut response)
        .await
        .unwrap();
    let mut r = Reader::new(&response[..len]);
    match Response::decode(&mut r).unwrap() {
        Response::Exception(ex) => {
            assert_eq!(ex.exception_code, ExceptionCode::ServerDeviceFailure)
        }
        other => panic!("unexpected response: {other:?}"),
    }
    assert_eq!(service.reads_served(), 1);

    transport.close().await.unwrap();
    server_task.abort();
    let _ = server_task.await;
}
