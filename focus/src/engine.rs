//! Countdown state machine with crash-resilient elapsed-time reconstruction.
//!
//! The engine never assumes it kept ticking while the process was gone. Every
//! write records a wall-clock anchor next to the remaining time, and a restart
//! subtracts whatever real time passed since that anchor. A record that lacks
//! the anchor falls back to the run's start time minus time spent paused.

use std::sync::Arc;

use focus_ipc::{TimerPhase, TimerStatus};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{PersistenceError, TimerError};
use crate::notify::{Completion, CompletionObserver};
use crate::persistence::TimerStore;
use crate::state::TimerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSettings {
    pub default_seconds: u64,
    /// Subtracting time never goes below this.
    pub adjust_floor_seconds: u64,
    /// Adding time never goes above this; also the hard ceiling for any state.
    pub max_seconds: u64,
    /// Minimum spacing of writes while the countdown is ticking.
    pub persist_throttle_ms: i64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            default_seconds: 25 * 60,
            adjust_floor_seconds: 5 * 60,
            max_seconds: 120 * 60,
            persist_throttle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not ticking; nothing changed.
    Inert,
    Ticked,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Immediate,
    Throttled,
}

pub struct FocusTimerEngine {
    state: TimerState,
    settings: TimerSettings,
    clock: Arc<dyn Clock>,
    store: Box<dyn TimerStore>,
    observers: Vec<Box<dyn CompletionObserver>>,
    last_write_ms: Option<i64>,
    dirty: bool,
}

impl FocusTimerEngine {
    /// Read the stored checkpoint and rebuild the timer from it.
    pub fn restore(
        settings: TimerSettings,
        clock: Arc<dyn Clock>,
        store: Box<dyn TimerStore>,
    ) -> Self {
        let now = clock.now_ms();
        let loaded = store.load();

        let mut engine = Self {
            state: TimerState::idle(settings.default_seconds),
            settings,
            clock,
            store,
            observers: Vec::new(),
            last_write_ms: None,
            dirty: false,
        };

        match loaded {
            Ok(Some(stored)) => {
                let (state, finished) = reconstruct(stored, now, &settings);
                engine.state = state;
                if finished {
                    info!("countdown finished while focus was not running");
                    engine.persist(Write::Immediate);
                }
            }
            Ok(None) => debug!("no stored timer state; starting idle"),
            Err(PersistenceError::ReadCorruption(e)) => {
                warn!("discarding malformed timer state: {}", e);
                engine.persist(Write::Immediate);
            }
            Err(e) => warn!("timer state unreadable, starting idle: {}", e),
        }

        info!(
            phase = %engine.state.phase(),
            remaining = engine.state.time_remaining_seconds,
            "timer restored"
        );
        engine
    }

    pub fn subscribe(&mut self, observer: impl CompletionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn phase(&self) -> TimerPhase {
        self.state.phase()
    }

    pub fn status(&self) -> TimerStatus {
        TimerStatus {
            phase: self.state.phase(),
            remaining_seconds: self.state.time_remaining_seconds,
            run_seconds: self
                .state
                .run_budget_seconds
                .unwrap_or(self.state.time_remaining_seconds),
            default_seconds: self.settings.default_seconds,
        }
    }

    pub fn start(&mut self) -> Result<(), TimerError> {
        self.expect_phase("start", TimerPhase::Idle)?;
        if self.state.time_remaining_seconds == 0 {
            self.state.time_remaining_seconds = self.settings.default_seconds;
        }

        let now = self.clock.now_ms();
        self.state.is_running = true;
        self.state.is_paused = false;
        self.state.started_at_epoch_ms = Some(now);
        self.state.paused_at_epoch_ms = None;
        self.state.total_paused_ms = 0;
        self.state.run_budget_seconds = Some(self.state.time_remaining_seconds);

        debug!(remaining = self.state.time_remaining_seconds, "timer started");
        self.persist(Write::Immediate);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        self.expect_phase("pause", TimerPhase::Running)?;
        self.state.is_paused = true;
        self.state.paused_at_epoch_ms = Some(self.clock.now_ms());

        debug!(remaining = self.state.time_remaining_seconds, "timer paused");
        self.persist(Write::Immediate);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TimerError> {
        self.expect_phase("resume", TimerPhase::Paused)?;
        let now = self.clock.now_ms();
        if let Some(paused_at) = self.state.paused_at_epoch_ms.take() {
            let paused_for = u64::try_from(now.saturating_sub(paused_at)).unwrap_or(0);
            self.state.total_paused_ms = self.state.total_paused_ms.saturating_add(paused_for);
        }
        self.state.is_paused = false;

        debug!(
            total_paused_ms = self.state.total_paused_ms,
            "timer resumed"
        );
        self.persist(Write::Immediate);
        Ok(())
    }

    /// Start/pause/resume depending on the current phase.
    pub fn toggle(&mut self) -> Result<(), TimerError> {
        match self.phase() {
            TimerPhase::Idle => self.start(),
            TimerPhase::Running => self.pause(),
            TimerPhase::Paused => self.resume(),
        }
    }

    pub fn stop(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        self.state.finish_run(self.settings.default_seconds);
        debug!("timer reset");
        self.persist(Write::Immediate);
    }

    /// Advance a ticking countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.state.is_ticking() || self.state.time_remaining_seconds == 0 {
            return TickOutcome::Inert;
        }

        self.state.time_remaining_seconds -= 1;
        if self.state.time_remaining_seconds > 0 {
            self.persist(Write::Throttled);
            return TickOutcome::Ticked;
        }

        let completion = Completion {
            started_at_epoch_ms: self.state.started_at_epoch_ms,
            completed_at_epoch_ms: self.clock.now_ms(),
            focused_seconds: self.state.run_budget_seconds.unwrap_or(0),
        };
        self.state.finish_run(self.settings.default_seconds);
        self.persist(Write::Immediate);

        info!(focused_seconds = completion.focused_seconds, "focus session complete");
        for observer in &self.observers {
            observer.on_completion(&completion);
        }
        TickOutcome::Completed
    }

    /// Adjust the remaining time. Subtractions stop at the adjust floor,
    /// additions stop at the ceiling.
    pub fn add_time(&mut self, delta_seconds: i64) {
        let current = self.state.time_remaining_seconds;
        let magnitude = delta_seconds.unsigned_abs();
        let updated = if delta_seconds < 0 {
            current
                .saturating_sub(magnitude)
                .max(self.settings.adjust_floor_seconds)
        } else {
            current
                .saturating_add(magnitude)
                .min(self.settings.max_seconds)
        };

        if updated == current {
            return;
        }
        self.state.time_remaining_seconds = updated;
        if let Some(budget) = self.state.run_budget_seconds {
            let adjusted = if updated > current {
                budget.saturating_add(updated - current)
            } else {
                budget.saturating_sub(current - updated)
            };
            self.state.run_budget_seconds = Some(adjusted);
        }

        debug!(delta_seconds, remaining = updated, "timer adjusted");
        self.persist(Write::Throttled);
    }

    /// Write out any change the throttle held back.
    pub fn flush(&mut self) {
        if self.dirty {
            self.persist(Write::Immediate);
        }
    }

    fn expect_phase(&self, action: &'static str, wanted: TimerPhase) -> Result<(), TimerError> {
        let phase = self.state.phase();
        if phase == wanted {
            Ok(())
        } else {
            Err(TimerError::InvalidTransition { action, phase })
        }
    }

    fn persist(&mut self, write: Write) {
        let now = self.clock.now_ms();
        if write == Write::Throttled && self.state.is_ticking() {
            if let Some(last) = self.last_write_ms {
                if now.saturating_sub(last) < self.settings.persist_throttle_ms {
                    self.dirty = true;
                    return;
                }
            }
        }

        self.state.last_persisted_at_epoch_ms = Some(now);
        self.state.last_persisted_remaining_seconds = Some(self.state.time_remaining_seconds);
        self.last_write_ms = Some(now);
        self.dirty = false;

        if let Err(e) = self.store.save(&self.state) {
            warn!("timer state not persisted, continuing in memory: {}", e);
        }
    }
}

/// Rebuild a stored record at time `now`.
/// The flag is true when the countdown ran out while nobody was watching.
pub fn reconstruct(mut stored: TimerState, now: i64, settings: &TimerSettings) -> (TimerState, bool) {
    if stored.normalize(settings.max_seconds, now) {
        debug!("repaired stored timer state");
    }
    if !stored.is_ticking() {
        return (stored, false);
    }

    let remaining = match (
        stored.last_persisted_at_epoch_ms,
        stored.last_persisted_remaining_seconds,
    ) {
        (Some(anchor), Some(anchored_remaining)) => {
            anchored_remaining.saturating_sub(whole_seconds_since(anchor, now))
        }
        _ => match stored.started_at_epoch_ms {
            Some(started) => {
                let budget = stored.run_budget_seconds.unwrap_or(settings.default_seconds);
                let since_start = now.saturating_sub(started);
                let paused = i64::try_from(stored.total_paused_ms).unwrap_or(i64::MAX);
                let active_ms = since_start.saturating_sub(paused);
                // The stored value was written after the start, so it bounds the result.
                budget
                    .saturating_sub(whole_seconds(active_ms))
                    .min(stored.time_remaining_seconds)
            }
            None => {
                warn!("running timer has no anchor; keeping stored remaining time");
                stored.time_remaining_seconds
            }
        },
    };

    if remaining == 0 {
        stored.finish_run(settings.default_seconds);
        return (stored, true);
    }
    stored.time_remaining_seconds = remaining;
    (stored, false)
}

fn whole_seconds_since(anchor_ms: i64, now_ms: i64) -> u64 {
    whole_seconds(now_ms.saturating_sub(anchor_ms))
}

/// Floor of `ms / 1000`; negative spans count as zero.
fn whole_seconds(ms: i64) -> u64 {
    u64::try_from(ms / 1000).unwrap_or(0)
}
