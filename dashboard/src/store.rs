use crate::metrics::READINGS_IN_STORE;
use crate::model::{display_cmp, PollPhase, Reading, SensorReading};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Points kept by the dashboard's rolling trend buffer.
pub const TREND_CAPACITY: usize = 12;

/// One point of the rolling trend, taken from the current reading of a
/// successful poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub temperature: f64,
    pub humidity: f64,
    pub at: DateTime<Utc>,
}

/// Read-only view of the store at one version.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub readings: Arc<[Reading]>,
    pub version: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn current(&self) -> Option<&SensorReading> {
        self.readings
            .iter()
            .find(|r| r.is_current())
            .map(Reading::reading)
    }

    /// Readings oldest first: history by ascending id, then the current
    /// reading as the latest.
    pub fn chronological(&self) -> Vec<SensorReading> {
        let mut ordered: Vec<&Reading> = self.readings.iter().collect();
        ordered.sort_by(|a, b| display_cmp(a, b));
        if let Some(first) = ordered.first() {
            if first.is_current() {
                let current = ordered.remove(0);
                ordered.push(current);
            }
        }
        ordered.into_iter().map(|r| r.reading().clone()).collect()
    }
}

#[derive(Debug)]
struct Inner {
    readings: Arc<[Reading]>,
    version: u64,
    last_updated: Option<DateTime<Utc>>,
    trend: VecDeque<TrendPoint>,
}

/// Holds exactly one reading array. Writers replace it wholesale; readers
/// get a shared snapshot they cannot mutate.
#[derive(Debug)]
pub struct ReadingStore {
    inner: RwLock<Inner>,
    in_flight: AtomicUsize,
}

impl Default for ReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                readings: Arc::from(Vec::<Reading>::new()),
                version: 0,
                last_updated: None,
                trend: VecDeque::with_capacity(TREND_CAPACITY),
            }),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Replaces the whole reading array and returns the new version.
    pub fn replace(&self, readings: Vec<Reading>) -> u64 {
        let now = Utc::now();
        let point = readings.iter().find(|r| r.is_current()).map(|r| TrendPoint {
            temperature: r.reading().temperature,
            humidity: r.reading().humidity,
            at: now,
        });
        let count = readings.len();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.readings = Arc::from(readings);
        inner.version += 1;
        inner.last_updated = Some(now);
        if let Some(point) = point {
            if inner.trend.len() == TREND_CAPACITY {
                inner.trend.pop_front();
            }
            inner.trend.push_back(point);
        }
        READINGS_IN_STORE.set(count as f64);
        inner.version
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            readings: Arc::clone(&inner.readings),
            version: inner.version,
            last_updated: inner.last_updated,
        }
    }

    pub fn version(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .version
    }

    /// Rolling trend, oldest first.
    pub fn trend(&self) -> Vec<TrendPoint> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.trend.iter().copied().collect()
    }

    pub fn phase(&self) -> PollPhase {
        if self.in_flight.load(Ordering::Acquire) > 0 {
            PollPhase::Loading
        } else {
            PollPhase::Idle
        }
    }

    /// Enters `Loading` until the returned guard is dropped.
    pub fn begin_loading(self: &Arc<Self>) -> LoadingGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        LoadingGuard {
            store: Arc::clone(self),
        }
    }
}

/// Leaves `Loading` on drop, whatever the outcome of the cycle was.
#[derive(Debug)]
pub struct LoadingGuard {
    store: Arc<ReadingStore>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sample;

    #[test]
    fn test_replace_swaps_whole_array() {
        let store = ReadingStore::new();
        store.replace(vec![Reading::historical("1", sample(20.0, 50.0))]);
        let before = store.snapshot();

        store.replace(vec![
            Reading::Current(sample(25.0, 55.0)),
            Reading::historical("1", sample(20.0, 50.0)),
        ]);
        let after = store.snapshot();

        assert_eq!(before.readings.len(), 1);
        assert_eq!(after.readings.len(), 2);
        assert_eq!(after.version, before.version + 1);
        assert!(after.last_updated.is_some());
    }

    #[test]
    fn test_chronological_puts_current_last() {
        let store = ReadingStore::new();
        store.replace(vec![
            Reading::Current(sample(30.0, 50.0)),
            Reading::historical("2", sample(22.0, 50.0)),
            Reading::historical("1", sample(21.0, 50.0)),
        ]);

        let temperatures: Vec<f64> = store
            .snapshot()
            .chronological()
            .iter()
            .map(|r| r.temperature)
            .collect();
        assert_eq!(temperatures, vec![21.0, 22.0, 30.0]);
    }

    #[test]
    fn test_trend_is_capped() {
        let store = ReadingStore::new();
        for i in 0..20 {
            store.replace(vec![Reading::Current(sample(i as f64, 50.0))]);
        }

        let trend = store.trend();
        assert_eq!(trend.len(), TREND_CAPACITY);
        assert_eq!(trend[0].temperature, 8.0);
        assert_eq!(trend[TREND_CAPACITY - 1].temperature, 19.0);
    }

    #[test]
    fn test_history_only_does_not_extend_trend() {
        let store = ReadingStore::new();
        store.replace(vec![Reading::historical("1", sample(20.0, 50.0))]);

        assert!(store.trend().is_empty());
    }

    #[test]
    fn test_loading_guard() {
        let store = Arc::new(ReadingStore::new());
        assert_eq!(store.phase(), PollPhase::Idle);

        let first = store.begin_loading();
        let second = store.begin_loading();
        assert_eq!(store.phase(), PollPhase::Loading);

        drop(first);
        assert_eq!(store.phase(), PollPhase::Loading);
        drop(second);
        assert_eq!(store.phase(), PollPhase::Idle);
    }
}
