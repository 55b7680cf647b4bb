use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use thermomod_client::{ClientError, SyncClientError};
use thermomod_sensor::{
    DeviceEndpoint, LinkConnector, ManualClock, PollerState, Reactor, RegisterLink, SensorConfig,
    SensorPoller,
};

struct ScriptedLink {
    script: VecDeque<Option<u16>>,
    reads: Rc<RefCell<usize>>,
}

impl RegisterLink for ScriptedLink {
    fn read_holding_registers(
        &mut self,
        _unit_id: u8,
        _start: u16,
        _quantity: u16,
    ) -> Result<Vec<u16>, SyncClientError> {
        *self.reads.borrow_mut() += 1;
        match self.script.pop_front().flatten() {
            Some(value) => Ok(vec![value, 0]),
            None => Err(SyncClientError::Client(ClientError::Timeout)),
        }
    }

    fn close(&mut self) {}
}

struct ScriptedConnector {
    script: RefCell<VecDeque<Option<u16>>>,
    reads: Rc<RefCell<usize>>,
}

impl LinkConnector for ScriptedConnector {
    fn connect(&self, _endpoint: &DeviceEndpoint) -> Result<Box<dyn RegisterLink>, SyncClientError> {
        Ok(Box::new(ScriptedLink {
            script: self.script.take(),
            reads: self.reads.clone(),
        }))
    }
}

proptest! {
    #[test]
    fn polls_land_on_period_multiples_until_first_failure(
        period in 1u64..10,
        script in prop::collection::vec(prop::option::weighted(0.9, 0u16..500), 1..40),
    ) {
        let reactor = Rc::new(Reactor::new(ManualClock::new(0.0)));
        let reads = Rc::new(RefCell::new(0));
        let connector = ScriptedConnector {
            script: RefCell::new(script.iter().copied().collect()),
            reads: reads.clone(),
        };
        let config = SensorConfig::default().with_report_period(Duration::from_secs(period));
        let poller = SensorPoller::new(config, connector, reactor.clone()).unwrap();

        let reports = Rc::new(RefCell::new(Vec::new()));
        let sink = reports.clone();
        poller.set_reporting_callback(move |at, value| sink.borrow_mut().push((at, value)));
        let faults = Rc::new(RefCell::new(0));
        let sink = faults.clone();
        poller.set_fault_callback(move |_| *sink.borrow_mut() += 1);

        poller.connect().unwrap();
        let horizon = (period * (script.len() as u64 + 5)) as f64;
        reactor.run_until(horizon);

        let successes = script.iter().take_while(|entry| entry.is_some()).count();
        let expected: Vec<(f64, f64)> = script
            .iter()
            .take(successes)
            .enumerate()
            .map(|(k, value)| ((k as u64 * period) as f64, f64::from(value.unwrap_or(0))))
            .collect();

        prop_assert_eq!(&*reports.borrow(), &expected);
        prop_assert_eq!(poller.state(), PollerState::Faulted);
        prop_assert_eq!(*faults.borrow(), 1);
        prop_assert_eq!(*reads.borrow(), successes + 1);
        let last = expected.last().map_or(0.0, |(_, value)| *value);
        prop_assert_eq!(poller.latest().0, last);
    }
}
