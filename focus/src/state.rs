//! The persisted timer record.

use focus_ipc::TimerPhase;
use serde::{Deserialize, Serialize};

/// Checkpoint of the countdown. Field names follow the stored JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub time_remaining_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,
    #[serde(default)]
    pub started_at_epoch_ms: Option<i64>,
    #[serde(default)]
    pub paused_at_epoch_ms: Option<i64>,
    #[serde(default)]
    pub total_paused_ms: u64,
    #[serde(default)]
    pub last_persisted_at_epoch_ms: Option<i64>,
    #[serde(default)]
    pub last_persisted_remaining_seconds: Option<u64>,
    /// Remaining time at start plus adjustments made during the run.
    #[serde(default)]
    pub run_budget_seconds: Option<u64>,
}

impl TimerState {
    pub fn idle(remaining_seconds: u64) -> Self {
        Self {
            time_remaining_seconds: remaining_seconds,
            is_running: false,
            is_paused: false,
            started_at_epoch_ms: None,
            paused_at_epoch_ms: None,
            total_paused_ms: 0,
            last_persisted_at_epoch_ms: None,
            last_persisted_remaining_seconds: None,
            run_budget_seconds: None,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        match (self.is_running, self.is_paused) {
            (false, _) => TimerPhase::Idle,
            (true, false) => TimerPhase::Running,
            (true, true) => TimerPhase::Paused,
        }
    }

    /// Running and not paused.
    pub fn is_ticking(&self) -> bool {
        self.is_running && !self.is_paused
    }

    /// Leave the run and go back to idle with `remaining_seconds` on the clock.
    /// The checkpoint pair is left alone; it is rewritten on the next persist.
    pub fn finish_run(&mut self, remaining_seconds: u64) {
        self.time_remaining_seconds = remaining_seconds;
        self.is_running = false;
        self.is_paused = false;
        self.started_at_epoch_ms = None;
        self.paused_at_epoch_ms = None;
        self.total_paused_ms = 0;
        self.run_budget_seconds = None;
    }

    /// Repair a loaded record so it satisfies the invariants.
    /// Returns true when anything had to change.
    pub fn normalize(&mut self, max_seconds: u64, now_ms: i64) -> bool {
        let before = self.clone();

        self.time_remaining_seconds = self.time_remaining_seconds.min(max_seconds);
        if !self.is_running {
            self.finish_run(self.time_remaining_seconds);
        } else if self.is_paused && self.paused_at_epoch_ms.is_none() {
            self.paused_at_epoch_ms = Some(now_ms);
        } else if !self.is_paused {
            self.paused_at_epoch_ms = None;
        }

        *self != before
    }
}
