use std::path::PathBuf;

use focus_ipc::TimerPhase;
use thiserror::Error;

/// Failures of the persistence slot. None of these are fatal to the timer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to write timer state to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read timer state from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode timer state: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("stored timer state is malformed: {0}")]
    ReadCorruption(#[from] serde_json::Error),

    #[error("timer storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimerError {
    #[error("cannot {action} while the timer is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: TimerPhase,
    },

    #[error("timer engine lock poisoned")]
    Poisoned,
}
