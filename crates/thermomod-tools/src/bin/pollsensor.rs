use clap::Parser;
use std::rc::Rc;
use std::time::Duration;
use thermomod_sensor::{
    PollerState, Reactor, Scheduler, SensorPoller, SystemClock, TcpLinkConnector, Waketime,
};
use thermomod_tools::common::{
    SensorArgs, TcpConnectionArgs, init_tracing, parse_interval, parse_seconds, sensor_config,
};
use thermomod_tools::watch::RangeWatch;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "pollsensor", about = "Poll a Modbus temperature sensor and watch its range")]
struct Args {
    #[command(flatten)]
    conn: TcpConnectionArgs,
    #[command(flatten)]
    sensor: SensorArgs,
    /// How often the range check reads the cached value.
    #[arg(long, default_value = "0.5", value_parser = parse_interval)]
    check_every: Duration,
    /// Stop after this many seconds instead of running until a fault.
    #[arg(long, value_parser = parse_seconds)]
    duration: Option<Duration>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let config = sensor_config(&args.conn, &args.sensor);

    let reactor = Rc::new(Reactor::new(SystemClock::new()));
    let poller = Rc::new(SensorPoller::new(config, TcpLinkConnector, reactor.clone())?);

    poller.set_reporting_callback(|at, celsius| println!("t={at:.3} temperature={celsius}"));
    poller.set_fault_callback(|message| eprintln!("fault: {message}"));

    let check_period = args.check_every.as_secs_f64();
    let watch = Rc::new(RangeWatch::new());
    let watcher = poller.clone();
    let range = watch.clone();
    reactor.register_timer(
        Box::new(move |now: f64| {
            if range.check(&watcher) {
                Waketime::At(now + check_period)
            } else {
                Waketime::Never
            }
        }),
        Waketime::Now,
    );

    poller.connect()?;
    let end = args
        .duration
        .map_or(f64::INFINITY, |limit| reactor.monotonic() + limit.as_secs_f64());
    reactor.run_until(end);

    info!(status = %poller.status(), "polling finished");
    poller.shutdown();
    if poller.state() == PollerState::Faulted {
        return Err("sensor faulted".into());
    }
    if watch.out_of_range() {
        return Err("temperature left the configured range".into());
    }
    Ok(())
}
