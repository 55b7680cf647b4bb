use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use thermomod_datalink::{InMemoryModbusService, ModbusTcpServer};
use thermomod_tools::common::{init_tracing, parse_seconds};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "simsensor", about = "Serve a simulated Modbus temperature sensor")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:5020")]
    bind: String,
    #[arg(long, default_value_t = 1)]
    register: u16,
    /// Starting temperature in whole degrees.
    #[arg(long, default_value_t = 20)]
    start: u16,
    /// Temperature the device ramps towards.
    #[arg(long, default_value_t = 200)]
    target: u16,
    /// Degrees moved per second.
    #[arg(long, default_value_t = 5)]
    ramp: u16,
    /// Answer every read with a device-failure exception after this long.
    #[arg(long, value_parser = parse_seconds)]
    fail_after: Option<Duration>,
}

fn step_towards(current: u16, target: u16, ramp: u16) -> u16 {
    if current < target {
        current.saturating_add(ramp).min(target)
    } else {
        current.saturating_sub(ramp).max(target)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    // Two words per poll, so the register after the temperature must exist too.
    let service = Arc::new(InMemoryModbusService::new(usize::from(args.register) + 2));
    service.set_holding_register(args.register, args.start)?;

    let server = ModbusTcpServer::bind(args.bind.as_str(), Arc::clone(&service)).await?;
    info!(addr = %server.local_addr()?, "simulated sensor listening");
    let server_task = tokio::spawn(server.run());

    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut current = args.start;
    let mut failing = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                current = step_towards(current, args.target, args.ramp);
                service.set_holding_register(args.register, current)?;
                if !failing && args.fail_after.is_some_and(|limit| started.elapsed() >= limit) {
                    failing = true;
                    service.set_device_failure(true);
                    info!("simulated sensor now failing");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!(reads = service.reads_served(), "simulated sensor stopping");
    server_task.abort();
    Ok(())
}
