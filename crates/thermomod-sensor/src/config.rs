use crate::error::ConfigError;
use std::time::Duration;
use thermomod_client::ClientConfig;

pub const ABSOLUTE_ZERO_C: f64 = -273.15;
pub const DEFAULT_MAX_TEMP: f64 = 99_999_999.9;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5020;
pub const DEFAULT_REGISTER: u16 = 1;
pub const DEFAULT_UNIT_ID: u8 = 1;
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_COUNT: u8 = 3;
pub const MIN_REPORT_PERIOD: Duration = Duration::from_secs(1);
/// Registers fetched per poll. Only the first one carries the temperature.
pub const REGISTER_COUNT: u16 = 2;

/// Plausible temperature range in °C, `min_temp < max_temp` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureBounds {
    min_temp: f64,
    max_temp: f64,
}

impl TemperatureBounds {
    pub fn new(min_temp: f64, max_temp: f64) -> Result<Self, ConfigError> {
        // NaN on either side fails this comparison too.
        if !(min_temp < max_temp) {
            return Err(ConfigError::InvalidBounds {
                min: min_temp,
                max: max_temp,
            });
        }
        Ok(Self { min_temp, max_temp })
    }

    pub fn min_temp(&self) -> f64 {
        self.min_temp
    }

    pub fn max_temp(&self) -> f64 {
        self.max_temp
    }

    pub fn contains(&self, celsius: f64) -> bool {
        celsius >= self.min_temp && celsius <= self.max_temp
    }
}

impl Default for TemperatureBounds {
    fn default() -> Self {
        Self {
            min_temp: ABSOLUTE_ZERO_C,
            max_temp: DEFAULT_MAX_TEMP,
        }
    }
}

/// Where the sensor lives and how patient to be with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    pub host: String,
    pub port: u16,
    pub response_timeout: Duration,
    pub retry_count: u8,
}

impl DeviceEndpoint {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_response_timeout(self.response_timeout)
            .with_retry_count(self.retry_count)
    }
}

impl Default for DeviceEndpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    pub endpoint: DeviceEndpoint,
    /// Holding register that carries the temperature in whole °C.
    pub register: u16,
    pub unit_id: u8,
    pub report_period: Duration,
    pub min_temp: f64,
    pub max_temp: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            endpoint: DeviceEndpoint::default(),
            register: DEFAULT_REGISTER,
            unit_id: DEFAULT_UNIT_ID,
            report_period: MIN_REPORT_PERIOD,
            min_temp: ABSOLUTE_ZERO_C,
            max_temp: DEFAULT_MAX_TEMP,
        }
    }
}

impl SensorConfig {
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.endpoint.host = host.into();
        self.endpoint.port = port;
        self
    }

    pub fn with_register(mut self, register: u16) -> Self {
        self.register = register;
        self
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_report_period(mut self, period: Duration) -> Self {
        self.report_period = period;
        self
    }

    pub fn with_temperature_range(mut self, min_temp: f64, max_temp: f64) -> Self {
        self.min_temp = min_temp;
        self.max_temp = max_temp;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint.response_timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u8) -> Self {
        self.endpoint.retry_count = retry_count;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.endpoint.response_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.report_period < MIN_REPORT_PERIOD {
            return Err(ConfigError::ReportPeriodTooShort(self.report_period));
        }
        if u32::from(self.register) + u32::from(REGISTER_COUNT) > 0x1_0000 {
            return Err(ConfigError::RegisterOutOfRange(self.register));
        }
        if self.min_temp < ABSOLUTE_ZERO_C {
            return Err(ConfigError::BelowAbsoluteZero(self.min_temp));
        }
        self.bounds().map(|_| ())
    }

    pub fn bounds(&self) -> Result<TemperatureBounds, ConfigError> {
        TemperatureBounds::new(self.min_temp, self.max_temp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_conventions() {
        let config = SensorConfig::default();
        assert_eq!(config.endpoint.address(), "127.0.0.1:5020");
        assert_eq!(config.register, 1);
        assert_eq!(config.unit_id, 1);
        assert_eq!(config.report_period, Duration::from_secs(1));
        assert_eq!(config.endpoint.response_timeout, Duration::from_secs(10));
        assert_eq!(config.endpoint.retry_count, 3);
        assert!(config.validate().is_ok());
        assert_eq!(config.bounds().unwrap(), TemperatureBounds::default());
    }

    #[test]
    fn bounds_require_strict_ordering() {
        assert!(TemperatureBounds::new(0.0, 300.0).is_ok());
        assert_eq!(
            TemperatureBounds::new(300.0, 0.0),
            Err(ConfigError::InvalidBounds { min: 300.0, max: 0.0 })
        );
        assert!(TemperatureBounds::new(50.0, 50.0).is_err());
        assert!(TemperatureBounds::new(f64::NAN, 50.0).is_err());
    }

    #[test]
    fn bounds_contains_is_inclusive() {
        let bounds = TemperatureBounds::new(0.0, 300.0).unwrap();
        assert!(bounds.contains(0.0));
        assert!(bounds.contains(300.0));
        assert!(!bounds.contains(300.5));
        assert!(!bounds.contains(-0.5));
    }

    #[test]
    fn validate_rejects_short_period() {
        let config = SensorConfig::default().with_report_period(Duration::from_millis(500));
        assert_eq!(
            config.validate(),
            Err(ConfigError::ReportPeriodTooShort(Duration::from_millis(500)))
        );
    }

    #[test]
    fn validate_rejects_below_absolute_zero() {
        let config = SensorConfig::default().with_temperature_range(-300.0, 100.0);
        assert_eq!(config.validate(), Err(ConfigError::BelowAbsoluteZero(-300.0)));
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let config = SensorConfig::default().with_temperature_range(100.0, 20.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout_and_empty_host() {
        let config = SensorConfig::default().with_response_timeout(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));

        let config = SensorConfig::default().with_endpoint("  ", 502);
        assert_eq!(config.validate(), Err(ConfigError::EmptyHost));
    }

    #[test]
    fn validate_rejects_register_window_past_end() {
        assert!(SensorConfig::default().with_register(0xFFFE).validate().is_ok());
        assert_eq!(
            SensorConfig::default().with_register(0xFFFF).validate(),
            Err(ConfigError::RegisterOutOfRange(0xFFFF))
        );
    }

    #[test]
    fn endpoint_feeds_client_config() {
        let config = SensorConfig::default()
            .with_response_timeout(Duration::from_secs(2))
            .with_retry_count(0);
        let client = config.endpoint.client_config();
        assert_eq!(client.response_timeout, Duration::from_secs(2));
        assert_eq!(client.retry_count, 0);
    }
}
