use std::sync::{Arc, PoisonError, RwLock};

/// One successful poll: whole-degree temperature and the reactor time of
/// the cycle that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub value: f64,
    pub measured_at: f64,
}

/// Confidence attached to a cached value. The device offers no quality
/// information, so every value is reported as valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingQuality {
    Valid,
}

/// Shared view of the last successful reading.
///
/// Only the poll cycle writes it; clones may be handed to consumers on
/// other threads, which never observe a half-written reading.
#[derive(Debug, Clone, Default)]
pub struct ReadingHandle {
    inner: Arc<RwLock<Option<SensorReading>>>,
}

impl ReadingHandle {
    pub(crate) fn store(&self, reading: SensorReading) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(reading);
    }

    pub fn reading(&self) -> Option<SensorReading> {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last value and its quality, `0.0` until the first successful read.
    pub fn latest(&self) -> (f64, ReadingQuality) {
        let value = self.reading().map_or(0.0, |reading| reading.value);
        (value, ReadingQuality::Valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_at_zero() {
        let handle = ReadingHandle::default();
        assert_eq!(handle.latest(), (0.0, ReadingQuality::Valid));
        assert_eq!(handle.reading(), None);
    }

    #[test]
    fn clones_share_the_same_slot() {
        let handle = ReadingHandle::default();
        let consumer = handle.clone();
        handle.store(SensorReading {
            value: 235.0,
            measured_at: 4.0,
        });
        assert_eq!(consumer.latest(), (235.0, ReadingQuality::Valid));
        assert_eq!(consumer.reading().map(|r| r.measured_at), Some(4.0));
    }

    #[test]
    fn readers_on_other_threads_see_whole_readings() {
        let handle = ReadingHandle::default();
        let reader = handle.clone();
        let join = thread::spawn(move || {
            for _ in 0..1_000 {
                if let Some(reading) = reader.reading() {
                    assert_eq!(reading.value, reading.measured_at);
                }
            }
        });
        for step in 0..1_000 {
            let t = f64::from(step);
            handle.store(SensorReading {
                value: t,
                measured_at: t,
            });
        }
        join.join().unwrap();
    }
}
