use clap::Args;
use std::time::Duration;
use thermomod_sensor::SensorConfig;
use thermomod_sensor::config::{
    ABSOLUTE_ZERO_C, DEFAULT_MAX_TEMP, DEFAULT_PORT, DEFAULT_REGISTER, DEFAULT_UNIT_ID,
};

#[derive(Debug, Clone, Args)]
pub struct TcpConnectionArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Response timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    pub timeout: u64,
    #[arg(long, default_value_t = 3)]
    pub retries: u8,
}

#[derive(Debug, Clone, Args)]
pub struct SensorArgs {
    #[arg(long, default_value_t = DEFAULT_REGISTER)]
    pub register: u16,
    #[arg(long, default_value_t = DEFAULT_UNIT_ID)]
    pub unit_id: u8,
    /// Seconds between polls, at least 1.
    #[arg(long, default_value = "1", value_parser = parse_seconds)]
    pub report_time: Duration,
    #[arg(long, default_value_t = ABSOLUTE_ZERO_C, allow_negative_numbers = true)]
    pub min_temp: f64,
    #[arg(long, default_value_t = DEFAULT_MAX_TEMP, allow_negative_numbers = true)]
    pub max_temp: f64,
}

pub fn sensor_config(conn: &TcpConnectionArgs, sensor: &SensorArgs) -> SensorConfig {
    SensorConfig::default()
        .with_endpoint(conn.host.clone(), conn.port)
        .with_response_timeout(Duration::from_millis(conn.timeout))
        .with_retry_count(conn.retries)
        .with_register(sensor.register)
        .with_unit_id(sensor.unit_id)
        .with_report_period(sensor.report_time)
        .with_temperature_range(sensor.min_temp, sensor.max_temp)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}

pub fn parse_seconds(input: &str) -> Result<Duration, String> {
    let seconds: f64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of seconds: {input}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("invalid number of seconds: {input}"))
}

/// Like [`parse_seconds`], but rejects zero so a timer never re-arms at
/// the instant it fired.
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let interval = parse_seconds(input)?;
    if interval.is_zero() {
        return Err(format!("interval must be greater than zero: {input}"));
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        conn: TcpConnectionArgs,
        #[command(flatten)]
        sensor: SensorArgs,
    }

    #[test]
    fn parse_seconds_accepts_fractions() {
        assert_eq!(parse_seconds("2"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_seconds(" 1.5 "), Ok(Duration::from_millis(1500)));
        assert!(parse_seconds("-1").is_err());
        assert!(parse_seconds("soon").is_err());
    }

    #[test]
    fn parse_interval_rejects_zero() {
        assert_eq!(parse_interval("0.5"), Ok(Duration::from_millis(500)));
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("0.0").is_err());
    }

    #[test]
    fn defaults_build_a_valid_config() {
        let cli = Cli::parse_from(["pollsensor"]);
        let config = sensor_config(&cli.conn, &cli.sensor);
        assert_eq!(config, SensorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_reach_the_config() {
        let cli = Cli::parse_from([
            "pollsensor",
            "--host",
            "10.0.0.7",
            "--port",
            "502",
            "--timeout",
            "1500",
            "--retries",
            "0",
            "--register",
            "40",
            "--report-time",
            "2",
            "--min-temp",
            "-20",
            "--max-temp",
            "300",
        ]);
        let config = sensor_config(&cli.conn, &cli.sensor);
        assert_eq!(config.endpoint.address(), "10.0.0.7:502");
        assert_eq!(config.endpoint.response_timeout, Duration::from_millis(1500));
        assert_eq!(config.endpoint.retry_count, 0);
        assert_eq!(config.register, 40);
        assert_eq!(config.report_period, Duration::from_secs(2));
        assert_eq!(config.min_temp, -20.0);
        assert_eq!(config.max_temp, 300.0);
    }
}
