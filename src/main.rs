// Clippy configuration: enable pedantic but allow overly strict lints
#![allow(clippy::missing_errors_doc)] // Internal functions don't need # Errors docs
#![allow(clippy::missing_panics_doc)] // Internal functions don't need # Panics docs
#![allow(clippy::must_use_candidate)] // Not all getters need #[must_use]
#![allow(clippy::module_name_repetitions)] // e.g., QueueKind in queue module is fine
#![allow(clippy::doc_markdown)] // Don't require backticks around JSON, ASCII, etc.
#![allow(clippy::too_many_lines)] // Some functions are naturally long
#![allow(clippy::cast_possible_truncation)] // Pixel and tile casts are bounded by the grid
#![allow(clippy::cast_sign_loss)] // Desk and index casts are checked before use
#![allow(clippy::cast_precision_loss)] // Millisecond to f32 precision loss is acceptable
#![allow(clippy::cast_possible_wrap)] // Queue lengths never approach i32::MAX
#![allow(clippy::match_same_arms)] // Explicit arms are clearer than combined patterns
#![allow(clippy::items_after_statements)] // Helper closures can be defined inline
#![allow(clippy::option_if_let_else)] // if-let is more readable for Option handling
#![allow(clippy::float_cmp)] // Exact waypoint equality is intended

//! Agent Office - coordination core for a simulated office of coding agents
//!
//! Agents step out of an elevator, queue to see the boss, work at their
//! desks, and queue again on the way out. A backend streams snapshots of who
//! exists and what they are doing; this binary decides how everyone moves.
//!
//! Usage:
//!   agent-office              # Listen on the socket and animate (default)
//!   agent-office run --emit   # Same, printing snapshot JSON lines
//!   agent-office simulate     # Scripted headless run
//!   agent-office grid         # Print the office grid

mod cli;
mod clock;
mod config;
mod errors;
mod event;
mod layout;
mod machine;
mod nav;
mod queue;
mod scenario;
mod state;
mod timers;

use clap::Parser;
use cli::{Cli, Commands};
use clock::{FrameScheduler, SystemClock};
use color_eyre::Result;
use config::OfficeConfig;
use state::Office;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Get the log directory path
fn get_log_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("/tmp/agent-office/logs"),
        |dirs| dirs.cache_dir().join("agent-office").join("logs"),
    )
}

fn log_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::new(format!("agent_office={level}"))
}

/// Log to stderr, for the one-shot commands
fn init_stderr_logging(level: &str) {
    tracing_subscriber::registry()
        .with(log_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(cli: &Cli) -> OfficeConfig {
    let mut config = match &cli.config {
        Some(path) => OfficeConfig::load_from_path(path),
        None => OfficeConfig::load(),
    };
    if let Some(rate) = cli.frame_rate {
        config.motion.frame_rate = rate;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            cli::print_completions(shell);
            Ok(())
        }
        Some(Commands::Config) => {
            print!("{}", OfficeConfig::example());
            Ok(())
        }
        Some(Commands::Grid) => {
            init_stderr_logging(&cli.log_level);
            let office = Office::new(load_config(&cli));
            print!("{}", office.debug_grid());
            Ok(())
        }
        Some(Commands::Simulate {
            agents,
            seconds,
            json,
        }) => {
            init_stderr_logging(&cli.log_level);
            let report = scenario::run(load_config(&cli), agents, seconds * 1000);
            if json {
                println!("{}", serde_json::to_string_pretty(&report.snapshot)?);
            } else {
                print!("{}", report.render_log());
            }
            Ok(())
        }
        Some(Commands::Run {
            emit,
            emit_interval_ms,
        }) => run(&cli, emit, emit_interval_ms).await,
        None => run(&cli, false, 1000).await,
    }
}

/// Listen for backend messages and tick the office until Ctrl-C
async fn run(cli: &Cli, emit: bool, emit_interval_ms: u64) -> Result<()> {
    // Setup file logging with rotation; stdout is reserved for snapshots
    let log_dir = get_log_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "agent-office.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(log_filter(&cli.log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(non_blocking),
        )
        .init();

    tracing::info!("Starting agent-office v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log directory: {:?}", log_dir);
    tracing::debug!("Socket path: {:?}", cli.socket);

    let config = load_config(cli);
    let frames = FrameScheduler::new(SystemClock::new(), config.motion.frame_rate);
    let mut office = Office::new(config);

    // Create event channel
    let (event_tx, mut event_rx) = mpsc::channel(100);

    // Spawn socket listener with cancellation support
    let cancel = CancellationToken::new();
    let socket_path = cli.socket.clone();
    let socket_cancel = cancel.clone();
    let socket_handle = tokio::spawn(async move {
        if let Err(e) = event::socket::listen(event_tx, &socket_path, socket_cancel).await {
            tracing::error!("Socket listener error: {}", e);
        }
    });

    tracing::info!(
        "Office running: {:.1} FPS, emit = {}",
        1000.0 / frames.frame_ms() as f64,
        emit
    );

    let mut frame = tokio::time::interval(frames.frame_duration());
    frame.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut emitter = tokio::time::interval(Duration::from_millis(emit_interval_ms.max(1)));
    emitter.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                let event::Event::Backend(message) = event;
                office.apply_message(*message);
            }
            _ = frame.tick() => {
                frames.tick(&mut office);
            }
            _ = emitter.tick(), if emit => {
                match serde_json::to_string(&office.snapshot()) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!("Failed to serialize snapshot: {}", e),
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    // Graceful shutdown: the listener removes its socket file on the way out
    cancel.cancel();
    if let Err(e) = socket_handle.await {
        tracing::debug!("Socket task ended abnormally: {}", e);
    }

    Ok(())
}
