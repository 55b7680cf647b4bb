use crate::config::ABSOLUTE_ZERO_C;
use std::time::Duration;
use thermomod_client::SyncClientError;
use thiserror::Error;

/// Rejected configuration. Always raised at setup time, never from a poll.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid temperature bounds: min {min} must be below max {max}")]
    InvalidBounds { min: f64, max: f64 },
    #[error("min_temp {0} is below absolute zero ({limit})", limit = ABSOLUTE_ZERO_C)]
    BelowAbsoluteZero(f64),
    #[error("report period {0:?} is shorter than one second")]
    ReportPeriodTooShort(Duration),
    #[error("response timeout must be non-zero")]
    ZeroTimeout,
    #[error("device host must not be empty")]
    EmptyHost,
    #[error("register window starting at {0} runs past the address space")]
    RegisterOutOfRange(u16),
}

/// Runtime failure surfaced to the caller of `connect`. Configuration
/// problems are reported earlier, as [`ConfigError`].
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: SyncClientError,
    },
}
