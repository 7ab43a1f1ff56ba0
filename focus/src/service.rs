//! Runtime host for the single timer engine.
//!
//! Every caller (the terminal UI, IPC clients) goes through a
//! [`TimerService`]. It applies the transition and then starts or cancels the
//! ticker while still holding the engine lock, so a state change and its
//! ticker change are seen together.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use focus_ipc::TimerStatus;
use tokio::runtime::Handle;
use tracing::debug;

use crate::engine::FocusTimerEngine;
use crate::error::TimerError;
use crate::ticker::{SharedEngine, Ticker};

#[derive(Clone)]
pub struct TimerService {
    engine: SharedEngine,
    ticker: Arc<Mutex<Option<Ticker>>>,
    runtime: Handle,
    tick_period: Duration,
}

impl TimerService {
    /// Take ownership of `engine`. A restored running countdown starts
    /// ticking right away.
    pub fn new(engine: FocusTimerEngine, runtime: Handle, tick_period: Duration) -> Self {
        let service = Self {
            engine: Arc::new(Mutex::new(engine)),
            ticker: Arc::new(Mutex::new(None)),
            runtime,
            tick_period,
        };
        if let Ok(engine) = service.engine.lock() {
            if let Err(e) = service.sync_ticker(&engine) {
                tracing::error!("could not start ticker for restored timer: {}", e);
            }
        }
        service
    }

    pub fn start(&self) -> Result<TimerStatus, TimerError> {
        self.apply(FocusTimerEngine::start)
    }

    pub fn pause(&self) -> Result<TimerStatus, TimerError> {
        self.apply(FocusTimerEngine::pause)
    }

    pub fn resume(&self) -> Result<TimerStatus, TimerError> {
        self.apply(FocusTimerEngine::resume)
    }

    pub fn toggle(&self) -> Result<TimerStatus, TimerError> {
        self.apply(FocusTimerEngine::toggle)
    }

    pub fn stop(&self) -> Result<TimerStatus, TimerError> {
        self.apply(|engine| {
            engine.stop();
            Ok(())
        })
    }

    pub fn reset(&self) -> Result<TimerStatus, TimerError> {
        self.apply(|engine| {
            engine.reset();
            Ok(())
        })
    }

    pub fn add_time(&self, delta_seconds: i64) -> Result<TimerStatus, TimerError> {
        self.apply(|engine| {
            engine.add_time(delta_seconds);
            Ok(())
        })
    }

    pub fn status(&self) -> Result<TimerStatus, TimerError> {
        Ok(self.lock_engine()?.status())
    }

    /// Stop ticking and write out anything the throttle held back.
    pub fn shutdown(&self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(ticker) = ticker.take() {
                ticker.cancel();
            }
        }
        if let Ok(mut engine) = self.engine.lock() {
            engine.flush();
        }
        debug!("timer service shut down");
    }

    fn apply<F>(&self, op: F) -> Result<TimerStatus, TimerError>
    where
        F: FnOnce(&mut FocusTimerEngine) -> Result<(), TimerError>,
    {
        let mut engine = self.lock_engine()?;
        op(&mut *engine)?;
        self.sync_ticker(&engine)?;
        Ok(engine.status())
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, FocusTimerEngine>, TimerError> {
        self.engine.lock().map_err(|_| TimerError::Poisoned)
    }

    /// Ticker runs exactly while the engine is ticking.
    fn sync_ticker(&self, engine: &FocusTimerEngine) -> Result<(), TimerError> {
        let mut ticker = self.ticker.lock().map_err(|_| TimerError::Poisoned)?;
        let ticking = engine.state().is_ticking();
        let active = ticker.as_ref().is_some_and(Ticker::is_active);

        if ticking && !active {
            *ticker = Some(Ticker::spawn(
                &self.runtime,
                Arc::clone(&self.engine),
                self.tick_period,
            ));
        } else if !ticking {
            if let Some(old) = ticker.take() {
                old.cancel();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::TimerSettings;
    use crate::notify::Completion;
    use crate::persistence::MemoryStore;
    use crate::state::TimerState;
    use focus_ipc::TimerPhase;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const T0: i64 = 1_700_000_000_000;

    fn service_with(store: MemoryStore) -> (TimerService, Arc<AtomicUsize>) {
        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        let mut engine = FocusTimerEngine::restore(
            TimerSettings::default(),
            Arc::new(ManualClock::at(T0)),
            Box::new(store),
        );
        engine.subscribe(move |_: &Completion| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let service = TimerService::new(engine, Handle::current(), Duration::from_secs(1));
        (service, completions)
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_completes_once() {
        let store = MemoryStore::new();
        store.put_raw(serde_json::to_string(&TimerState::idle(3)).unwrap());
        let (service, completions) = service_with(store);

        service.start().unwrap();
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(service.status().unwrap().remaining_seconds, 1);

        sleep(Duration::from_secs(1)).await;
        let status = service.status().unwrap();
        assert_eq!(status.phase, TimerPhase::Idle);
        assert_eq!(status.remaining_seconds, 1500);
        assert_eq!(completions.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(service.status().unwrap().remaining_seconds, 1500);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_ticking_until_resume() {
        let (service, _) = service_with(MemoryStore::new());

        service.start().unwrap();
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(service.pause().unwrap().remaining_seconds, 1499);

        sleep(Duration::from_secs(30)).await;
        assert_eq!(service.status().unwrap().remaining_seconds, 1499);

        service.resume().unwrap();
        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(service.status().unwrap().remaining_seconds, 1497);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_ticker() {
        let (service, completions) = service_with(MemoryStore::new());

        service.start().unwrap();
        sleep(Duration::from_millis(3_500)).await;
        let status = service.stop().unwrap();
        assert_eq!(status.phase, TimerPhase::Idle);
        assert_eq!(status.remaining_seconds, 1500);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(service.status().unwrap().remaining_seconds, 1500);
        assert_eq!(completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restored_run_resumes_ticking() {
        let store = MemoryStore::new();
        store.put_raw(
            serde_json::to_string(&TimerState {
                is_running: true,
                started_at_epoch_ms: Some(T0),
                last_persisted_at_epoch_ms: Some(T0),
                last_persisted_remaining_seconds: Some(600),
                run_budget_seconds: Some(600),
                ..TimerState::idle(600)
            })
            .unwrap(),
        );
        let (service, _) = service_with(store);

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(service.status().unwrap().remaining_seconds, 598);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_transition_leaves_ticker_alone() {
        let (service, _) = service_with(MemoryStore::new());

        service.start().unwrap();
        assert!(matches!(
            service.start(),
            Err(TimerError::InvalidTransition { .. })
        ));
        sleep(Duration::from_millis(1_500)).await;
        assert_eq!(service.status().unwrap().remaining_seconds, 1499);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restart_right_after_completion_keeps_ticking() {
        let settings = TimerSettings {
            default_seconds: 1,
            adjust_floor_seconds: 1,
            max_seconds: 60,
            persist_throttle_ms: 0,
        };
        let engine = FocusTimerEngine::restore(
            settings,
            Arc::new(ManualClock::at(T0)),
            Box::new(MemoryStore::new()),
        );
        let service = TimerService::new(engine, Handle::current(), Duration::from_micros(200));

        for run in 0..500 {
            service.start().unwrap();
            let finished = tokio::time::timeout(Duration::from_secs(2), async {
                while service.status().unwrap().phase != TimerPhase::Idle {
                    tokio::task::yield_now().await;
                }
            })
            .await;
            assert!(finished.is_ok(), "run {run} stayed running without a ticker");
        }
        service.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_throttled_ticks() {
        let store = MemoryStore::new();
        let (service, _) = service_with(store.clone());

        service.start().unwrap();
        sleep(Duration::from_millis(2_500)).await;
        service.shutdown();

        let stored: TimerState = serde_json::from_str(&store.raw().unwrap()).unwrap();
        assert_eq!(stored.last_persisted_remaining_seconds, Some(1498));
        assert!(stored.is_running);
    }
}
