use crate::fetcher::SensorSource;
use crate::metrics::{FETCH_FAILURES_TOTAL, POLL_CYCLES_TOTAL, STALE_WRITES_TOTAL};
use crate::store::ReadingStore;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Stored { version: u64 },
    Failed,
    Discarded,
}

/// Flag flipped once at teardown. Store writes run while holding it, so no
/// write can start after `kill` returns.
#[derive(Debug)]
struct Liveness(Mutex<bool>);

impl Liveness {
    fn new() -> Self {
        Self(Mutex::new(true))
    }

    fn run_if_alive<T>(&self, write: impl FnOnce() -> T) -> Option<T> {
        let alive = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *alive {
            Some(write())
        } else {
            None
        }
    }

    fn kill(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// Cloneable handle for requesting an immediate cycle.
#[derive(Debug, Clone)]
pub struct RefreshTrigger(mpsc::Sender<()>);

impl RefreshTrigger {
    /// Returns false if a cycle is already queued or the poller has stopped.
    pub fn refresh(&self) -> bool {
        self.0.try_send(()).is_ok()
    }
}

/// Handle to a running poller. Dropping it tears the poller down.
#[derive(Debug)]
pub struct PollHandle {
    liveness: Arc<Liveness>,
    shutdown_tx: watch::Sender<bool>,
    refresh: RefreshTrigger,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn refresh(&self) -> bool {
        self.refresh.refresh()
    }

    pub fn trigger(&self) -> RefreshTrigger {
        self.refresh.clone()
    }

    /// Stops the timer and suppresses every result still in flight.
    pub async fn shutdown(mut self) {
        self.liveness.kill();
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Poller stopped");
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.liveness.kill();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Starts polling: one cycle right away, then one every `period`.
pub fn spawn(
    source: Arc<dyn SensorSource>,
    store: Arc<ReadingStore>,
    period: Duration,
) -> PollHandle {
    let liveness = Arc::new(Liveness::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (refresh_tx, refresh_rx) = mpsc::channel(1);

    let task = tokio::spawn(run_poller(
        source,
        store,
        period,
        Arc::clone(&liveness),
        shutdown_rx,
        refresh_rx,
    ));

    PollHandle {
        liveness,
        shutdown_tx,
        refresh: RefreshTrigger(refresh_tx),
        task: Some(task),
    }
}

async fn run_poller(
    source: Arc<dyn SensorSource>,
    store: Arc<ReadingStore>,
    period: Duration,
    liveness: Arc<Liveness>,
    mut shutdown_rx: watch::Receiver<bool>,
    mut refresh_rx: mpsc::Receiver<()>,
) {
    info!("Starting poller with period={:?}", period);

    // The first tick completes immediately.
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                spawn_cycle(&source, &store, &liveness);
            }

            Some(()) = refresh_rx.recv() => {
                debug!("Refresh requested");
                spawn_cycle(&source, &store, &liveness);
            }

            _ = shutdown_rx.changed() => {
                break;
            }
        }
    }
}

// Each cycle runs on its own task so a slow read never delays the timer.
fn spawn_cycle(
    source: &Arc<dyn SensorSource>,
    store: &Arc<ReadingStore>,
    liveness: &Arc<Liveness>,
) {
    let source = Arc::clone(source);
    let store = Arc::clone(store);
    let liveness = Arc::clone(liveness);
    tokio::spawn(async move {
        run_cycle(source.as_ref(), &store, &liveness).await;
    });
}

async fn run_cycle(
    source: &dyn SensorSource,
    store: &Arc<ReadingStore>,
    liveness: &Liveness,
) -> CycleOutcome {
    POLL_CYCLES_TOTAL.inc();
    let _loading = store.begin_loading();

    match source.fetch().await {
        Ok(readings) => {
            let count = readings.len();
            match liveness.run_if_alive(|| store.replace(readings)) {
                Some(version) => {
                    debug!("Stored {} readings as version {}", count, version);
                    CycleOutcome::Stored { version }
                }
                None => {
                    debug!("Discarding {} readings fetched after shutdown", count);
                    STALE_WRITES_TOTAL.inc();
                    CycleOutcome::Discarded
                }
            }
        }
        Err(e) => {
            FETCH_FAILURES_TOTAL.inc();
            warn!("Sensor fetch failed, keeping last known readings: {}", e);
            CycleOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Error, Result};
    use crate::model::{sample, PollPhase, Reading};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const LONG: Duration = Duration::from_secs(3600);

    struct ScriptedSource {
        calls: AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl SensorSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<Reading>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_after {
                return Err(Error::Upstream("backend unreachable".to_string()));
            }
            Ok(vec![
                Reading::Current(sample(25.0, 60.0)),
                Reading::historical("1", sample(20.0, 55.0)),
            ])
        }
    }

    struct GatedSource {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SensorSource for GatedSource {
        async fn fetch(&self) -> Result<Vec<Reading>> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(vec![Reading::Current(sample(25.0, 60.0))])
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_fetches_immediately_on_start() {
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let store = Arc::new(ReadingStore::new());

        let handle = spawn(source.clone(), Arc::clone(&store), LONG);
        wait_until(|| store.version() == 1).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.snapshot().readings.len(), 2);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_keeps_last_known_good() {
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            fail_after: 1,
        });
        let store = Arc::new(ReadingStore::new());

        let handle = spawn(source.clone(), Arc::clone(&store), LONG);
        wait_until(|| store.version() == 1).await;

        assert!(handle.refresh());
        wait_until(|| source.calls.load(Ordering::SeqCst) == 2).await;
        wait_until(|| store.phase() == PollPhase::Idle).await;

        let snapshot = store.snapshot();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.readings.len(), 2);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_no_write_after_teardown() {
        let source = Arc::new(GatedSource {
            started: Notify::new(),
            release: Notify::new(),
        });
        let store = Arc::new(ReadingStore::new());

        let handle = spawn(source.clone(), Arc::clone(&store), LONG);
        source.started.notified().await;
        assert_eq!(store.phase(), PollPhase::Loading);

        handle.shutdown().await;
        source.release.notify_one();

        wait_until(|| store.phase() == PollPhase::Idle).await;
        assert_eq!(store.version(), 0);
        assert!(store.snapshot().readings.is_empty());
    }

    #[tokio::test]
    async fn test_run_cycle_outcomes() {
        let source = ScriptedSource {
            calls: AtomicUsize::new(0),
            fail_after: 1,
        };
        let store = Arc::new(ReadingStore::new());
        let liveness = Liveness::new();

        assert_eq!(
            run_cycle(&source, &store, &liveness).await,
            CycleOutcome::Stored { version: 1 }
        );
        assert_eq!(run_cycle(&source, &store, &liveness).await, CycleOutcome::Failed);
        assert_eq!(store.phase(), PollPhase::Idle);
    }

    #[tokio::test]
    async fn test_run_cycle_after_kill_is_discarded() {
        let source = ScriptedSource {
            calls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        };
        let store = Arc::new(ReadingStore::new());
        let liveness = Liveness::new();
        liveness.kill();

        assert_eq!(
            run_cycle(&source, &store, &liveness).await,
            CycleOutcome::Discarded
        );
        assert_eq!(store.version(), 0);
    }
}
