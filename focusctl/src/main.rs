use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use focus_ipc::{Command, Response, TimerStatus, DEFAULT_SOCKET_PATH};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "focusctl")]
#[command(about = "Control a running focus timer", long_about = None)]
struct Cli {
    /// IPC socket of the focus instance
    #[arg(long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the timer
    Start,
    /// Pause the timer
    Pause,
    /// Resume the timer
    Resume,
    /// Stop the timer
    Stop,
    /// Reset the timer
    Reset,
    /// Get timer status
    Status,
    /// Add minutes to the timer (negative to subtract)
    Add {
        #[arg(allow_hyphen_values = true)]
        minutes: i64,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Start => Command::Start,
            Commands::Pause => Command::Pause,
            Commands::Resume => Command::Resume,
            Commands::Stop => Command::Stop,
            Commands::Reset => Command::Reset,
            Commands::Status => Command::Status,
            Commands::Add { minutes } => Command::AddTime {
                seconds: minutes.saturating_mul(60),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = Command::from(cli.command);

    let response = focus_ipc::request(&cli.socket, &command)
        .await
        .with_context(|| format!("Failed to reach focus at {:?}", cli.socket))?;

    match response {
        Response::Ok(status) => println!("{}", describe(&status)),
        Response::Error(e) => bail!(e),
    }

    Ok(())
}

fn describe(status: &TimerStatus) -> String {
    let phase = status.phase.to_string();
    let mut phase = phase.chars();
    let phase = match phase.next() {
        Some(first) => first.to_uppercase().chain(phase).collect(),
        None => String::new(),
    };
    format!(
        "{} {} / {}",
        phase,
        mmss(status.remaining_seconds),
        mmss(status.run_seconds)
    )
}

fn mmss(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
