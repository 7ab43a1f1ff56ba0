//! Unix domain socket server for IPC

use crate::service::TimerService;
use anyhow::{Context, Result};
use focus_ipc::{Command, Response};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub async fn serve(
    socket_path: PathBuf,
    service: TimerService,
    shutdown: CancellationToken,
) -> Result<()> {
    // Remove old socket if it exists
    let _ = std::fs::remove_file(&socket_path);

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("Failed to bind IPC socket at {:?}", socket_path))?;
    info!("IPC server listening on {:?}", socket_path);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let service = service.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, service).await {
                            error!("Error handling client: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            },
        }
    }

    cleanup(&socket_path);
    info!("IPC server stopped");
    Ok(())
}

fn cleanup(socket_path: &Path) {
    if let Err(e) = std::fs::remove_file(socket_path) {
        debug!("Could not remove socket {:?}: {}", socket_path, e);
    }
}

async fn handle_client(stream: UnixStream, service: TimerService) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let command: Command = focus_ipc::receive(&mut reader).await?;
    debug!(?command, "IPC command received");

    let response = dispatch(&service, command);
    focus_ipc::send(&mut writer, &response).await?;
    Ok(())
}

/// Apply one command to the timer.
pub fn dispatch(service: &TimerService, command: Command) -> Response {
    let result = match command {
        Command::Start => service.start(),
        Command::Pause => service.pause(),
        Command::Resume => service.resume(),
        Command::Stop => service.stop(),
        Command::Reset => service.reset(),
        Command::Status => service.status(),
        Command::AddTime { seconds } => service.add_time(seconds),
    };

    match result {
        Ok(status) => Response::Ok(status),
        Err(e) => Response::Error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::{FocusTimerEngine, TimerSettings};
    use crate::persistence::MemoryStore;
    use focus_ipc::TimerPhase;
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> TimerService {
        let engine = FocusTimerEngine::restore(
            TimerSettings::default(),
            Arc::new(ManualClock::at(1_700_000_000_000)),
            Box::new(MemoryStore::new()),
        );
        TimerService::new(
            engine,
            tokio::runtime::Handle::current(),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn dispatch_reports_status_after_each_command() {
        let service = service();

        match dispatch(&service, Command::Start) {
            Response::Ok(status) => assert_eq!(status.phase, TimerPhase::Running),
            other => panic!("unexpected response: {:?}", other),
        }
        match dispatch(&service, Command::AddTime { seconds: 60 }) {
            Response::Ok(status) => assert_eq!(status.run_seconds, 1560),
            other => panic!("unexpected response: {:?}", other),
        }
        service.shutdown();
    }

    #[tokio::test]
    async fn dispatch_turns_invalid_transition_into_error() {
        let service = service();
        assert_eq!(
            dispatch(&service, Command::Resume),
            Response::Error("cannot resume while the timer is idle".to_string())
        );
    }

    #[tokio::test]
    async fn serves_requests_over_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("focus.sock");
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(socket.clone(), service(), shutdown.clone()));

        let mut response = None;
        for _ in 0..50 {
            match focus_ipc::request(&socket, &Command::Status).await {
                Ok(r) => {
                    response = Some(r);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        match response {
            Some(Response::Ok(status)) => {
                assert_eq!(status.phase, TimerPhase::Idle);
                assert_eq!(status.remaining_seconds, 1500);
            }
            other => panic!("unexpected response: {:?}", other),
        }

        shutdown.cancel();
        server.await.unwrap().unwrap();
        assert!(!socket.exists());
    }
}
