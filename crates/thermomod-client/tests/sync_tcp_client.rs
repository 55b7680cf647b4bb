use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use thermomod_client::{ClientConfig, ClientError, SyncClientError, SyncModbusTcpClient};
use thermomod_datalink::{InMemoryModbusService, ModbusTcpServer};
use tokio::sync::oneshot;

#[test]
fn sync_client_reads_simulated_device() {
    let service = Arc::new(InMemoryModbusService::new(8));
    service
        .set_holding_register(1, 235)
        .expect("fixture register set should succeed");

    let (addr_tx, addr_rx) = mpsc::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_service = Arc::clone(&service);

    let server_thread = std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime should build");

        runtime.block_on(async move {
            let server = ModbusTcpServer::bind("127.0.0.1:0", server_service)
                .await
                .expect("server should bind");
            addr_tx
                .send(server.local_addr().expect("local addr should be available"))
                .expect("address should be sent");

            let task = tokio::spawn(server.run());
            let _ = shutdown_rx.await;
            task.abort();
            let _ = task.await;
        });
    });

    let addr = addr_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("server address should arrive");

    let config = ClientConfig::default()
        .with_response_timeout(Duration::from_secs(2))
        .with_retry_count(0);
    let client = SyncModbusTcpClient::connect_with_config(&addr.to_string(), config)
        .expect("sync client should connect");
    assert_eq!(client.config(), config);

    let values = client
        .read_holding_registers(1, 1, 2)
        .expect("read should succeed");
    assert_eq!(values, vec![235, 0]);

    let defaults = SyncModbusTcpClient::connect(&addr.to_string())
        .expect("default client should connect");
    assert_eq!(defaults.config(), ClientConfig::default());
    assert_eq!(
        defaults
            .read_holding_registers(1, 1, 1)
            .expect("read should succeed"),
        vec![235]
    );
    defaults.close().expect("close should succeed");

    service.set_device_failure(true);
    let err = client
        .read_holding_registers(1, 1, 2)
        .expect_err("failing device should surface an exception");
    assert!(matches!(
        err,
        SyncClientError::Client(ClientError::Exception(_))
    ));

    client.close().expect("close should succeed");

    shutdown_tx.send(()).expect("shutdown signal should be sent");
    server_thread.join().expect("server thread should join");
}
