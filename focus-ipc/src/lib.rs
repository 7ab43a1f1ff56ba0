//! Inter-process communication between focus and focusctl
//!
//! We use Unix domain sockets for local IPC. Each connection carries one
//! request and one response, each encoded as a single line of JSON.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Commands that focusctl can send to focus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    Status,
    /// Adjust the remaining time; negative values subtract.
    AddTime { seconds: i64 },
}

/// Responses from focus back to focusctl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The command was applied; carries the resulting status.
    Ok(TimerStatus),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub phase: TimerPhase,
    pub remaining_seconds: u64,
    /// Length of the current run including adjustments, or the remaining
    /// time when idle.
    pub run_seconds: u64,
    pub default_seconds: u64,
}

impl TimerStatus {
    /// Fraction of the current run already spent, in `0.0..=1.0`.
    pub fn progress(&self) -> f64 {
        if self.run_seconds == 0 || self.phase == TimerPhase::Idle {
            return 0.0;
        }
        let spent = self.run_seconds.saturating_sub(self.remaining_seconds);
        (spent as f64 / self.run_seconds as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TimerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
            TimerPhase::Paused => "paused",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused - is focus running?")]
    ConnectionRefused,

    #[error("Connection closed before a message was received")]
    Closed,
}

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/focus.sock";

/// Write one message as a JSON line and flush it.
pub async fn send<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one JSON line and decode it.
pub async fn receive<R, T>(reader: &mut R) -> Result<T, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::Closed);
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Connect to a running focus instance, send `command` and wait for its reply.
pub async fn request(socket_path: &Path, command: &Command) -> Result<Response, IpcError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::ConnectionRefused | ErrorKind::NotFound => IpcError::ConnectionRefused,
            _ => IpcError::Io(e),
        })?;

    let (reader, mut writer) = stream.into_split();
    send(&mut writer, command).await?;

    let mut reader = BufReader::new(reader);
    receive(&mut reader).await
}
