//! Cooperative polling of a Modbus temperature sensor.
//!
//! A [`SensorPoller`] is driven by a single-threaded [`Reactor`]: every time
//! its timer fires it performs exactly one blocking holding-register read,
//! caches the result and re-arms itself one report period later. The first
//! failed read closes the connection and disarms the timer for good, so a
//! control loop never keeps consuming a sensor that has stopped answering.
//!
//! Consumers pull the last cached value through [`SensorPoller::latest`] or
//! a cloned [`ReadingHandle`], which never touches the network.
//!
//! ```no_run
//! use std::rc::Rc;
//! use thermomod_sensor::{Reactor, SensorConfig, SensorPoller, SystemClock, TcpLinkConnector};
//!
//! let reactor = Rc::new(Reactor::new(SystemClock::new()));
//! let poller = SensorPoller::new(SensorConfig::default(), TcpLinkConnector, reactor.clone())?;
//! poller.set_reporting_callback(|at, celsius| println!("{at:.3} {celsius}"));
//! poller.connect()?;
//! reactor.run_until(10.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod link;
pub mod poller;
pub mod reactor;
pub mod reading;

pub use config::{DeviceEndpoint, SensorConfig, TemperatureBounds};
pub use error::{ConfigError, PollerError};
pub use link::{LinkConnector, RegisterLink, TcpLinkConnector};
pub use poller::{PollerState, SensorPoller, SensorStatus};
pub use reactor::{Clock, ManualClock, Reactor, Scheduler, SystemClock, TimerId, Waketime};
pub use reading::{ReadingHandle, ReadingQuality, SensorReading};
