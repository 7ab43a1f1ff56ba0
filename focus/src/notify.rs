//! Completion observers.
//!
//! The engine calls every registered observer once when a live countdown
//! reaches zero. Observers must not block; anything slow belongs on the far
//! side of a channel.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub started_at_epoch_ms: Option<i64>,
    pub completed_at_epoch_ms: i64,
    /// Length of the finished run including adjustments.
    pub focused_seconds: u64,
}

pub trait CompletionObserver: Send {
    fn on_completion(&self, completion: &Completion);
}

impl<F> CompletionObserver for F
where
    F: Fn(&Completion) + Send,
{
    fn on_completion(&self, completion: &Completion) {
        self(completion)
    }
}

/// Fans completions out to any number of in-process listeners.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Completion>,
}

impl BroadcastNotifier {
    pub fn new(tx: broadcast::Sender<Completion>) -> Self {
        Self { tx }
    }
}

impl CompletionObserver for BroadcastNotifier {
    fn on_completion(&self, completion: &Completion) {
        // No receivers is normal in headless mode.
        if self.tx.send(completion.clone()).is_err() {
            debug!("no listeners for completion event");
        }
    }
}

/// Desktop notification through the platform notification service.
pub struct DesktopNotifier {
    appname: String,
}

impl DesktopNotifier {
    pub fn new(appname: impl Into<String>) -> Self {
        Self {
            appname: appname.into(),
        }
    }
}

impl CompletionObserver for DesktopNotifier {
    fn on_completion(&self, completion: &Completion) {
        let body = format!(
            "{} of focus done. Time for a break.",
            crate::ui::format_minutes(completion.focused_seconds)
        );
        let mut notification = notify_rust::Notification::new();
        notification
            .summary("Focus session complete")
            .body(&body)
            .appname(&self.appname);

        // Showing talks to the notification daemon; keep it off the engine lock.
        let show = move || {
            if let Err(e) = notification.show() {
                warn!("Failed to send notification: {}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(show);
            }
            Err(_) => show(),
        }
    }
}
