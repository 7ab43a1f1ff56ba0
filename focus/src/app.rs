use crate::config::Config;
use crate::error::TimerError;
use crate::notify::Completion;
use crate::service::TimerService;
use crossterm::event::KeyCode;
use focus_ipc::{TimerPhase, TimerStatus};
use tokio::sync::broadcast;
use tracing::warn;

pub const ONE_MINUTE: i64 = 60;
pub const FIVE_MINUTES: i64 = 5 * 60;

#[derive(Default, Clone, PartialEq, Debug)]
pub enum AppMode {
    #[default]
    Normal,
    ShowHelp,
    Completed(Completion),
}

pub struct App {
    pub service: TimerService,
    pub config: Config,
    pub mode: AppMode,
    /// Last rejected action, shown in the status bar.
    pub message: Option<String>,
    pub should_quit: bool,
    completions: broadcast::Receiver<Completion>,
}

impl App {
    pub fn new(
        service: TimerService,
        config: Config,
        completions: broadcast::Receiver<Completion>,
    ) -> Self {
        Self {
            service,
            config,
            mode: AppMode::Normal,
            message: None,
            should_quit: false,
            completions,
        }
    }

    /// Snapshot for drawing. A poisoned engine shows as an idle zero timer.
    pub fn status(&self) -> TimerStatus {
        self.service.status().unwrap_or(TimerStatus {
            phase: TimerPhase::Idle,
            remaining_seconds: 0,
            run_seconds: 0,
            default_seconds: 0,
        })
    }

    pub fn handle_key(&mut self, code: KeyCode) {
        match self.mode {
            AppMode::ShowHelp | AppMode::Completed(_) => match code {
                KeyCode::Char('q') => self.should_quit = true,
                _ => self.mode = AppMode::Normal,
            },
            AppMode::Normal => match code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('?') => self.mode = AppMode::ShowHelp,
                KeyCode::Char(' ') => self.run(TimerService::toggle),
                KeyCode::Char('s') => self.run(TimerService::stop),
                KeyCode::Char('r') => self.run(TimerService::reset),
                KeyCode::Char('+') | KeyCode::Char('=') => {
                    self.run(|service| service.add_time(ONE_MINUTE))
                }
                KeyCode::Char(']') => self.run(|service| service.add_time(FIVE_MINUTES)),
                KeyCode::Char('[') => self.run(|service| service.add_time(-FIVE_MINUTES)),
                _ => {}
            },
        }
    }

    /// Pick up completions raised by the ticker since the last frame.
    pub fn check_completions(&mut self) {
        loop {
            match self.completions.try_recv() {
                Ok(completion) => self.mode = AppMode::Completed(completion),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("missed {} completion events", skipped);
                }
                Err(_) => break,
            }
        }
    }

    fn run<F>(&mut self, action: F)
    where
        F: FnOnce(&TimerService) -> Result<TimerStatus, TimerError>,
    {
        self.message = match action(&self.service) {
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::{FocusTimerEngine, TimerSettings};
    use crate::notify::BroadcastNotifier;
    use crate::persistence::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn app() -> App {
        let (tx, rx) = broadcast::channel(4);
        let mut engine = FocusTimerEngine::restore(
            TimerSettings::default(),
            Arc::new(ManualClock::at(1_700_000_000_000)),
            Box::new(MemoryStore::new()),
        );
        engine.subscribe(BroadcastNotifier::new(tx));
        let service = TimerService::new(
            engine,
            tokio::runtime::Handle::current(),
            Duration::from_secs(1),
        );
        App::new(service, Config::default(), rx)
    }

    #[tokio::test]
    async fn space_cycles_and_brackets_adjust() {
        let mut app = app();

        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.status().phase, TimerPhase::Running);
        app.handle_key(KeyCode::Char(' '));
        assert_eq!(app.status().phase, TimerPhase::Paused);

        app.handle_key(KeyCode::Char(']'));
        assert_eq!(app.status().remaining_seconds, 1800);
        app.handle_key(KeyCode::Char('['));
        app.handle_key(KeyCode::Char('+'));
        assert_eq!(app.status().remaining_seconds, 1560);

        app.handle_key(KeyCode::Char('s'));
        assert_eq!(app.status().phase, TimerPhase::Idle);
        assert!(app.message.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_opens_overlay_until_key() {
        let mut app = app();
        app.service.add_time(-FIVE_MINUTES * 10).unwrap();
        app.handle_key(KeyCode::Char(' '));

        tokio::time::sleep(Duration::from_secs(301)).await;
        app.check_completions();
        assert!(matches!(app.mode, AppMode::Completed(_)));

        app.handle_key(KeyCode::Char('x'));
        assert_eq!(app.mode, AppMode::Normal);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn help_and_quit() {
        let mut app = app();
        app.handle_key(KeyCode::Char('?'));
        assert_eq!(app.mode, AppMode::ShowHelp);
        app.handle_key(KeyCode::Esc);
        assert_eq!(app.mode, AppMode::Normal);
        app.handle_key(KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
