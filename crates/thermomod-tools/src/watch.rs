use std::cell::Cell;
use thermomod_sensor::{PollerState, SensorPoller};

/// Consumer-side range check over a poller's cached temperature.
///
/// The first excursion outside the poller's bounds is reported through
/// [`SensorPoller::report_fault`]; later ones are not repeated.
#[derive(Debug, Default)]
pub struct RangeWatch {
    reported: Cell<bool>,
}

impl RangeWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn out_of_range(&self) -> bool {
        self.reported.get()
    }

    /// Run one check. Returns `false` once the poller has faulted and
    /// there is nothing left to watch.
    pub fn check(&self, poller: &SensorPoller) -> bool {
        if poller.state() == PollerState::Faulted {
            return false;
        }
        let Some(reading) = poller.reading_handle().reading() else {
            return true;
        };
        let bounds = poller.bounds();
        if !bounds.contains(reading.value) && !self.reported.replace(true) {
            poller.report_fault(&format!(
                "temperature {} outside [{}, {}]",
                reading.value,
                bounds.min_temp(),
                bounds.max_temp()
            ));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::RangeWatch;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use thermomod_client::{ClientError, SyncClientError};
    use thermomod_sensor::{
        DeviceEndpoint, LinkConnector, ManualClock, Reactor, RegisterLink, SensorConfig,
        SensorPoller,
    };

    struct Canned(VecDeque<u16>);

    impl RegisterLink for Canned {
        fn read_holding_registers(
            &mut self,
            _unit_id: u8,
            _start: u16,
            _quantity: u16,
        ) -> Result<Vec<u16>, SyncClientError> {
            self.0
                .pop_front()
                .map(|value| vec![value, 0])
                .ok_or(SyncClientError::Client(ClientError::Timeout))
        }

        fn close(&mut self) {}
    }

    struct CannedConnector(RefCell<VecDeque<u16>>);

    impl LinkConnector for CannedConnector {
        fn connect(
            &self,
            _endpoint: &DeviceEndpoint,
        ) -> Result<Box<dyn RegisterLink>, SyncClientError> {
            Ok(Box::new(Canned(self.0.take())))
        }
    }

    type Watched = (Rc<Reactor<ManualClock>>, SensorPoller, Rc<RefCell<Vec<String>>>);

    fn watched(values: &[u16]) -> Watched {
        let reactor = Rc::new(Reactor::new(ManualClock::new(0.0)));
        let connector = CannedConnector(RefCell::new(values.iter().copied().collect()));
        let config = SensorConfig::default().with_temperature_range(0.0, 300.0);
        let poller = SensorPoller::new(config, connector, reactor.clone()).unwrap();
        let faults = Rc::new(RefCell::new(Vec::new()));
        let sink = faults.clone();
        poller.set_fault_callback(move |message| sink.borrow_mut().push(message.to_string()));
        (reactor, poller, faults)
    }

    #[test]
    fn nothing_to_check_before_first_reading() {
        let (_reactor, poller, faults) = watched(&[]);
        let watch = RangeWatch::new();
        assert!(watch.check(&poller));
        assert!(!watch.out_of_range());
        assert!(faults.borrow().is_empty());
    }

    #[test]
    fn excursion_is_reported_once() {
        let (reactor, poller, faults) = watched(&[350, 360]);
        poller.connect().unwrap();
        let watch = RangeWatch::new();

        reactor.run_pending();
        assert!(watch.check(&poller));
        reactor.run_until(1.0);
        assert!(watch.check(&poller));

        assert!(watch.out_of_range());
        assert_eq!(
            *faults.borrow(),
            vec!["temperature 350 outside [0, 300]".to_string()]
        );
    }

    #[test]
    fn in_range_reading_is_quiet() {
        let (reactor, poller, faults) = watched(&[120]);
        poller.connect().unwrap();
        reactor.run_pending();

        let watch = RangeWatch::new();
        assert!(watch.check(&poller));
        assert!(!watch.out_of_range());
        assert!(faults.borrow().is_empty());
    }

    #[test]
    fn faulted_poller_stops_the_watch() {
        let (reactor, poller, faults) = watched(&[]);
        poller.connect().unwrap();
        reactor.run_pending();

        let watch = RangeWatch::new();
        assert!(!watch.check(&poller));
        assert_eq!(faults.borrow().len(), 1);
    }
}
