use crate::config::{REGISTER_COUNT, SensorConfig, TemperatureBounds};
use crate::error::{ConfigError, PollerError};
use crate::link::{LinkConnector, RegisterLink};
use crate::reactor::{Scheduler, TimerId, Waketime};
use crate::reading::{ReadingHandle, ReadingQuality, SensorReading};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Lifecycle of a poller.
///
/// `Faulted` is terminal: the connection is closed, the timer stays disarmed
/// and neither `connect` nor `shutdown` leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Unconnected,
    Armed,
    Faulted,
}

pub type ReportingCallback = Rc<dyn Fn(f64, f64)>;
pub type FaultCallback = Rc<dyn Fn(&str)>;

/// Snapshot for status displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorStatus {
    /// Last temperature rounded to two decimals, `0.0` before the first read.
    pub temperature: f64,
    pub measured_at: Option<f64>,
    pub state: PollerState,
    pub bounds: TemperatureBounds,
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temperature={:.2} state={:?} range=[{}, {}]",
            self.temperature,
            self.state,
            self.bounds.min_temp(),
            self.bounds.max_temp()
        )?;
        if let Some(at) = self.measured_at {
            write!(f, " measured_at={at:.3}")?;
        }
        Ok(())
    }
}

enum PollOutcome {
    Reading {
        reading: SensorReading,
        callback: Option<ReportingCallback>,
    },
    Fault {
        message: String,
        callback: Option<FaultCallback>,
    },
    Idle,
}

struct PollerCore {
    config: SensorConfig,
    connector: Box<dyn LinkConnector>,
    link: Option<Box<dyn RegisterLink>>,
    state: PollerState,
    // Bumped on every successful connect.
    session: u64,
    bounds: TemperatureBounds,
    readings: ReadingHandle,
    on_reading: Option<ReportingCallback>,
    on_fault: Option<FaultCallback>,
}

impl PollerCore {
    fn poll_once(&mut self, eventtime: f64) -> PollOutcome {
        if self.state != PollerState::Armed {
            return PollOutcome::Idle;
        }
        let Some(link) = self.link.as_mut() else {
            return PollOutcome::Idle;
        };

        let result =
            link.read_holding_registers(self.config.unit_id, self.config.register, REGISTER_COUNT);
        let failure = match result {
            Ok(registers) => match registers.first() {
                Some(&raw) => {
                    if let Some(aux) = registers.get(1) {
                        trace!(register = self.config.register + 1, value = aux, "auxiliary word");
                    }
                    let reading = SensorReading {
                        value: f64::from(raw),
                        measured_at: eventtime,
                    };
                    self.readings.store(reading);
                    debug!(value = reading.value, at = eventtime, "sensor reading");
                    return PollOutcome::Reading {
                        reading,
                        callback: self.on_reading.clone(),
                    };
                }
                None => "device returned no registers".to_string(),
            },
            Err(err) => err.to_string(),
        };

        self.close_link();
        self.state = PollerState::Faulted;
        PollOutcome::Fault {
            message: format!(
                "modbus sensor at {} failed: {failure}",
                self.config.endpoint.address()
            ),
            callback: self.on_fault.clone(),
        }
    }

    fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
    }
}

fn notify_fault(callback: Option<FaultCallback>, message: &str) {
    warn!("{message}");
    if let Some(callback) = callback {
        callback(message);
    }
}

fn on_timer_fire(core: &RefCell<PollerCore>, period: f64, eventtime: f64) -> Waketime {
    // The borrow ends here so callbacks may call back into the poller.
    let outcome = core.borrow_mut().poll_once(eventtime);
    match outcome {
        PollOutcome::Reading { reading, callback } => {
            let session = core.borrow().session;
            if let Some(callback) = callback {
                callback(reading.measured_at, reading.value);
            }
            let core = core.borrow();
            match core.state {
                // Reconnected from inside the callback: keep its immediate poll.
                PollerState::Armed if core.session != session => Waketime::Now,
                PollerState::Armed => Waketime::At(eventtime + period),
                _ => Waketime::Never,
            }
        }
        PollOutcome::Fault { message, callback } => {
            notify_fault(callback, &message);
            Waketime::Never
        }
        PollOutcome::Idle => Waketime::Never,
    }
}

/// Periodic reader of one temperature register.
///
/// Each timer firing performs exactly one blocking read. Success caches the
/// value, invokes the reporting callback and re-arms one report period
/// later. The first failure closes the connection, reports a fault once and
/// leaves the timer disarmed.
pub struct SensorPoller {
    core: Rc<RefCell<PollerCore>>,
    scheduler: Rc<dyn Scheduler>,
    timer: TimerId,
    readings: ReadingHandle,
    report_period: Duration,
}

impl SensorPoller {
    pub fn new(
        config: SensorConfig,
        connector: impl LinkConnector + 'static,
        scheduler: Rc<dyn Scheduler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let bounds = config.bounds()?;
        let report_period = config.report_period;
        let readings = ReadingHandle::default();

        let core = Rc::new(RefCell::new(PollerCore {
            config,
            connector: Box::new(connector),
            link: None,
            state: PollerState::Unconnected,
            session: 0,
            bounds,
            readings: readings.clone(),
            on_reading: None,
            on_fault: None,
        }));

        let period = report_period.as_secs_f64();
        let timer_core = core.clone();
        let timer = scheduler.register_timer(
            Box::new(move |eventtime: f64| on_timer_fire(&timer_core, period, eventtime)),
            Waketime::Never,
        );

        Ok(Self {
            core,
            scheduler,
            timer,
            readings,
            report_period,
        })
    }

    /// Open the device connection and request an immediate first poll.
    ///
    /// Only valid from `Unconnected`; a second call while armed or after a
    /// fault is ignored. A failed connect leaves the poller unconnected.
    pub fn connect(&self) -> Result<(), PollerError> {
        let mut core = self.core.borrow_mut();
        if core.state != PollerState::Unconnected {
            warn!(state = ?core.state, "connect ignored, poller already started");
            return Ok(());
        }

        let endpoint = &core.config.endpoint;
        let link = core
            .connector
            .connect(endpoint)
            .map_err(|source| PollerError::Connect {
                address: endpoint.address(),
                source,
            })?;
        info!(address = %endpoint.address(), period = ?self.report_period, "sensor connected");
        core.link = Some(link);
        core.state = PollerState::Armed;
        core.session += 1;
        drop(core);

        self.scheduler.update_timer(self.timer, Waketime::Now);
        Ok(())
    }

    /// Close the connection and disarm the timer. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut core = self.core.borrow_mut();
        match core.state {
            PollerState::Faulted => return,
            PollerState::Armed => {
                core.close_link();
                core.state = PollerState::Unconnected;
                info!("sensor shut down");
            }
            PollerState::Unconnected => {}
        }
        drop(core);
        self.scheduler.update_timer(self.timer, Waketime::Never);
    }

    /// Last cached temperature. Never performs I/O.
    pub fn latest(&self) -> (f64, ReadingQuality) {
        self.readings.latest()
    }

    pub fn reading_handle(&self) -> ReadingHandle {
        self.readings.clone()
    }

    pub fn set_bounds(&self, min_temp: f64, max_temp: f64) -> Result<(), ConfigError> {
        let bounds = TemperatureBounds::new(min_temp, max_temp)?;
        self.core.borrow_mut().bounds = bounds;
        Ok(())
    }

    pub fn bounds(&self) -> TemperatureBounds {
        self.core.borrow().bounds
    }

    /// Replace the reading callback. Takes effect from the next poll.
    pub fn set_reporting_callback(&self, callback: impl Fn(f64, f64) + 'static) {
        self.core.borrow_mut().on_reading = Some(Rc::new(callback));
    }

    pub fn set_fault_callback(&self, callback: impl Fn(&str) + 'static) {
        self.core.borrow_mut().on_fault = Some(Rc::new(callback));
    }

    /// Surface a fault detected by a consumer, such as an out-of-range
    /// temperature. Does not change the poller state.
    pub fn report_fault(&self, message: &str) {
        let callback = self.core.borrow().on_fault.clone();
        notify_fault(callback, message);
    }

    pub fn state(&self) -> PollerState {
        self.core.borrow().state
    }

    pub fn report_period(&self) -> Duration {
        self.report_period
    }

    pub fn status(&self) -> SensorStatus {
        let core = self.core.borrow();
        let reading = self.readings.reading();
        SensorStatus {
            temperature: reading.map_or(0.0, |r| (r.value * 100.0).round() / 100.0),
            measured_at: reading.map(|r| r.measured_at),
            state: core.state,
            bounds: core.bounds,
        }
    }
}

impl Drop for SensorPoller {
    fn drop(&mut self) {
        if let Ok(mut core) = self.core.try_borrow_mut() {
            core.close_link();
        }
        self.scheduler.unregister_timer(self.timer);
    }
}
