//! Single-threaded timer reactor.
//!
//! Timers are plain callbacks that receive the reactor time they fired at
//! and return when they want to run next. Every callback runs to completion
//! on the calling thread before the next one is considered, so two firings
//! of the same timer can never overlap.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// When a timer should next fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waketime {
    /// As soon as the reactor gets control.
    Now,
    /// At the given reactor time, in seconds.
    At(f64),
    /// Disarmed.
    Never,
}

impl Waketime {
    fn due_at(self) -> Option<f64> {
        match self {
            Self::Now => Some(f64::NEG_INFINITY),
            Self::At(time) => Some(time),
            Self::Never => None,
        }
    }
}

impl PartialOrd for Waketime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let key = |waketime: &Self| waketime.due_at().unwrap_or(f64::INFINITY);
        match (self, other) {
            (Self::Never, Self::Never) => Some(std::cmp::Ordering::Equal),
            (Self::Never, _) => Some(std::cmp::Ordering::Greater),
            (_, Self::Never) => Some(std::cmp::Ordering::Less),
            _ => key(self).partial_cmp(&key(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(usize);

pub type TimerCallback = Box<dyn FnMut(f64) -> Waketime>;

/// Monotonic time source in seconds.
pub trait Clock {
    fn monotonic(&self) -> f64;
    fn sleep_until(&self, deadline: f64);
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn sleep_until(&self, deadline: f64) {
        let remaining = deadline - self.monotonic();
        if remaining.is_finite() && remaining > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(remaining));
        }
    }
}

/// Clock that only moves when told to. Sleeping jumps straight to the
/// deadline. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, time: f64) {
        self.now.set(time);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> f64 {
        self.now.get()
    }

    fn sleep_until(&self, deadline: f64) {
        if deadline.is_finite() && deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

/// Timer registration surface handed to components that schedule work.
pub trait Scheduler {
    fn monotonic(&self) -> f64;
    fn register_timer(&self, callback: TimerCallback, waketime: Waketime) -> TimerId;
    fn update_timer(&self, timer: TimerId, waketime: Waketime);
    fn unregister_timer(&self, timer: TimerId);
}

struct TimerSlot {
    waketime: Waketime,
    // `None` while the callback is running or after unregistration.
    callback: Option<TimerCallback>,
    live: bool,
}

pub struct Reactor<C: Clock = SystemClock> {
    clock: C,
    timers: RefCell<Vec<TimerSlot>>,
}

impl<C: Clock> Reactor<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            timers: RefCell::new(Vec::new()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Earliest armed waketime, `None` when every timer is disarmed.
    pub fn next_waketime(&self) -> Option<f64> {
        self.next_due().map(|(_, due)| due)
    }

    pub fn armed_timers(&self) -> usize {
        self.timers
            .borrow()
            .iter()
            .filter(|slot| slot.live && slot.waketime != Waketime::Never)
            .count()
    }

    /// Fire every timer already due without waiting. Returns the number of
    /// callbacks run.
    pub fn run_pending(&self) -> usize {
        let now = self.clock.monotonic();
        let mut fired = 0;
        while let Some((id, due)) = self.next_due() {
            if due > now {
                break;
            }
            self.fire(id);
            fired += 1;
        }
        fired
    }

    /// Dispatch timers in waketime order until `end`, sleeping in between.
    /// Returns the number of callbacks run.
    pub fn run_until(&self, end: f64) -> usize {
        let mut fired = 0;
        while let Some((id, due)) = self.next_due() {
            if due > end {
                break;
            }
            self.clock.sleep_until(due);
            self.fire(id);
            fired += 1;
        }
        self.clock.sleep_until(end);
        fired
    }

    fn next_due(&self) -> Option<(TimerId, f64)> {
        let timers = self.timers.borrow();
        let mut best: Option<(TimerId, f64)> = None;
        for (index, slot) in timers.iter().enumerate() {
            if !slot.live || slot.callback.is_none() {
                continue;
            }
            let Some(due) = slot.waketime.due_at() else {
                continue;
            };
            match best {
                Some((_, current)) if due.total_cmp(&current).is_ge() => {}
                _ => best = Some((TimerId(index), due)),
            }
        }
        best
    }

    fn fire(&self, id: TimerId) {
        let callback = {
            let mut timers = self.timers.borrow_mut();
            timers.get_mut(id.0).and_then(|slot| slot.callback.take())
        };
        let Some(mut callback) = callback else {
            return;
        };

        // No borrow is held here: the callback may register or update timers.
        let next = callback(self.clock.monotonic());

        let mut timers = self.timers.borrow_mut();
        if let Some(slot) = timers.get_mut(id.0) {
            if slot.live {
                slot.waketime = next;
                slot.callback = Some(callback);
            }
        }
    }
}

impl<C: Clock> Scheduler for Reactor<C> {
    fn monotonic(&self) -> f64 {
        self.clock.monotonic()
    }

    fn register_timer(&self, callback: TimerCallback, waketime: Waketime) -> TimerId {
        let mut timers = self.timers.borrow_mut();
        timers.push(TimerSlot {
            waketime,
            callback: Some(callback),
            live: true,
        });
        TimerId(timers.len() - 1)
    }

    fn update_timer(&self, timer: TimerId, waketime: Waketime) {
        if let Some(slot) = self.timers.borrow_mut().get_mut(timer.0) {
            if slot.live {
                slot.waketime = waketime;
            }
        }
    }

    fn unregister_timer(&self, timer: TimerId) {
        let callback = {
            let mut timers = self.timers.borrow_mut();
            timers.get_mut(timer.0).and_then(|slot| {
                slot.live = false;
                slot.waketime = Waketime::Never;
                slot.callback.take()
            })
        };
        drop(callback);
    }
}
