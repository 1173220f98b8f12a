mod api;
mod app;
mod auth;
mod config;
mod dashboard;
mod error;
mod event;
mod guard;
mod input;
mod monitor;
mod notify;
mod session;
mod storage;
mod task;
mod token;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::Instant;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use crate::api::TaskClient;
use crate::app::App;
use crate::config::{default_config_path, Config, FileConfig, Overrides};
use crate::error::AppError;
use crate::event::{AppEvent, Route};
use crate::storage::{FileStorage, MemoryStorage, Storage, TOKEN_KEY};

const TICK: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "taskdash", version, about = "Terminal client for a remote task list")]
struct Cli {
    /// Config file (defaults to <config dir>/taskdash/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the task API
    #[arg(long, env = "TASKDASH_BASE_URL")]
    base_url: Option<String>,

    /// Where the credential is persisted
    #[arg(long, env = "TASKDASH_STORAGE")]
    storage: Option<PathBuf>,

    /// Keep the credential in memory only; nothing is written to disk
    #[arg(long)]
    ephemeral: bool,

    /// Route to open on start
    #[arg(long, default_value = "/")]
    open: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether the stored credential is still usable
    Session,
    /// Forget the stored credential
    Logout,
}

fn log_appender(log_dir: &Path) -> Result<RollingFileAppender, AppError> {
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("taskdash.log")
        .build(log_dir)?)
}

fn init_logging(config: &Config) -> Result<WorkerGuard, AppError> {
    let (writer, guard) = tracing_appender::non_blocking(log_appender(&config.log_dir)?);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskdash=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

/// Storage backing the TUI. The file is only opened when it will be used.
fn open_storage(config: &Config, ephemeral: bool) -> Result<Arc<dyn Storage>, AppError> {
    if ephemeral {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    Ok(Arc::new(FileStorage::open(&config.storage_path)?))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = Config::resolve(
        FileConfig::load(&config_path)?,
        Overrides {
            base_url: cli.base_url.clone(),
            storage_path: cli.storage.clone(),
        },
    )?;
    let _log_guard = init_logging(&config)?;
    info!(base_url = %config.base_url, "starting");

    match cli.command {
        Some(Command::Session) => {
            let storage = FileStorage::open(&config.storage_path)?;
            match session::validate(&storage) {
                Ok(claims) => {
                    let user = claims.display_name().unwrap_or("unknown user");
                    match claims.get("exp") {
                        Some(exp) => println!("valid: {user} (exp {exp})"),
                        None => println!("valid: {user} (no expiry)"),
                    }
                }
                Err(reason) => println!("invalid: {reason}"),
            }
            return Ok(());
        }
        Some(Command::Logout) => {
            let storage = FileStorage::open(&config.storage_path)?;
            storage.remove(TOKEN_KEY)?;
            println!("credential removed from {}", storage.path().display());
            return Ok(());
        }
        None => {}
    }

    let storage = open_storage(&config, cli.ephemeral)?;
    let client = TaskClient::new(config.base_url.clone());

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut app = App::new(storage, client, tx);
    app.navigate(Route::from_path(&cli.open));

    let result = run_app(&mut terminal, &mut app, rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = &result {
        error!(%err, "event loop failed");
    }
    info!("exiting");
    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut rx: UnboundedReceiver<AppEvent>,
) -> Result<(), AppError> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);

    while !app.should_quit() {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            input = events.next() => match input {
                Some(Ok(event)) => app.handle_input(event, Instant::now()),
                Some(Err(err)) => return Err(err.into()),
                None => break,
            },
            Some(event) = rx.recv() => app.handle_event(event, Instant::now()),
            _ = tick.tick() => app.tick(Instant::now()),
        }
    }
    Ok(())
}
