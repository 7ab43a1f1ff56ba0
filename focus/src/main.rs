use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod app;
mod clock;
mod config;
mod engine;
mod error;
mod ipc;
mod logging;
mod notify;
mod persistence;
mod service;
mod state;
mod ticker;
mod ui;

use app::App;
use clock::SystemClock;
use config::Config;
use engine::FocusTimerEngine;
use logging::LogTarget;
use notify::{BroadcastNotifier, Completion, DesktopNotifier};
use persistence::{FileStore, MemoryStore, TimerStore};
use service::TimerService;

#[derive(Parser)]
#[command(name = "focus")]
#[command(about = "Focus timer that survives restarts", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Keep a separate timer for this profile
    #[arg(short, long)]
    profile: Option<String>,
    /// IPC socket path
    #[arg(long)]
    socket: Option<PathBuf>,
    /// Run without the terminal UI until interrupted
    #[arg(long)]
    headless: bool,
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = config::load_config(cli.config.as_deref())?;
    if let Some(profile) = cli.profile {
        config.storage.profile = Some(profile);
    }
    if let Some(socket) = cli.socket {
        config.ipc.socket_path = socket;
    }

    let data_dir = config
        .storage
        .data_dir
        .clone()
        .map(Ok)
        .unwrap_or_else(persistence::default_data_dir);

    let log_path = data_dir.as_ref().ok().map(|dir| dir.join("focus.log"));
    let log_target = match (&log_path, cli.headless) {
        (Some(path), false) => LogTarget::File(path),
        _ => LogTarget::Stderr,
    };
    logging::init(log_target, cli.verbose)?;
    info!("Starting focus v{}", env!("CARGO_PKG_VERSION"));

    let key = persistence::storage_key(&config.storage.key, config.storage.profile.as_deref());
    let store: Box<dyn TimerStore> = match &data_dir {
        Ok(dir) => {
            let store = FileStore::in_dir(dir, &key);
            info!("Timer state stored at {:?}", store.path());
            Box::new(store)
        }
        Err(e) => {
            warn!("{}; timer state will not survive a restart", e);
            Box::new(MemoryStore::new())
        }
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let _guard = runtime.enter();

    let (completion_tx, completion_rx) = broadcast::channel(16);
    let mut engine = FocusTimerEngine::restore(
        config.timer.settings(),
        Arc::new(SystemClock),
        store,
    );
    engine.subscribe(BroadcastNotifier::new(completion_tx));
    if config.notifications.desktop {
        engine.subscribe(DesktopNotifier::new("focus"));
    }
    let service = TimerService::new(engine, runtime.handle().clone(), config.timer.tick_period());

    let shutdown = CancellationToken::new();
    let server = runtime.spawn(ipc::server::serve(
        config.ipc.socket_path.clone(),
        service.clone(),
        shutdown.clone(),
    ));

    let res = if cli.headless {
        runtime.block_on(async {
            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");
            Ok::<(), anyhow::Error>(())
        })
    } else {
        run_tui(service.clone(), config, completion_rx)
    };

    shutdown.cancel();
    service.shutdown();
    match runtime.block_on(server) {
        Ok(Err(e)) => error!("IPC server failed: {:#}", e),
        Err(e) => error!("IPC server task panicked: {}", e),
        Ok(Ok(())) => {}
    }

    info!("focus shut down");
    res
}

fn run_tui(
    service: TimerService,
    config: Config,
    completions: broadcast::Receiver<Completion>,
) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(service, config, completions);
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> Result<()> {
    loop {
        app.check_completions();
        terminal.draw(|f| ui::draw(f, &app))?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
