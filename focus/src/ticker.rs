//! Once-a-second driver for a running countdown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::engine::{FocusTimerEngine, TickOutcome};

pub type SharedEngine = Arc<Mutex<FocusTimerEngine>>;

/// A repeating tick task. Dropping the ticker cancels it.
pub struct Ticker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(runtime: &Handle, engine: SharedEngine, period: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = runtime.spawn(run(engine, token.clone(), period));
        debug!(?period, "ticker spawned");
        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// False once cancelled or once the task ended on its own.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(engine: SharedEngine, token: CancellationToken, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }
        if !tick_once(&engine, &token) {
            break;
        }
    }
    debug!("ticker stopped");
}

/// Returns false when the ticker should stop. A stopping ticker cancels its
/// own token before the engine lock is released, so the service never mistakes
/// it for a live one.
fn tick_once(engine: &SharedEngine, token: &CancellationToken) -> bool {
    let mut engine = match engine.lock() {
        Ok(engine) => engine,
        Err(_) => {
            error!("timer engine lock poisoned; ticker stopping");
            token.cancel();
            return false;
        }
    };
    // Checked under the lock: the service cancels while holding it.
    if token.is_cancelled() {
        return false;
    }
    let keep_going = matches!(engine.tick(), TickOutcome::Ticked);
    if !keep_going {
        token.cancel();
    }
    keep_going
}
