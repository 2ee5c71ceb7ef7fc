//! CLI argument parsing
//!
//! Uses clap for argument parsing with derive macros.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

/// Get default socket path, preferring XDG_RUNTIME_DIR on Linux
fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join("agent-office.sock");
    }
    PathBuf::from("/tmp/agent-office.sock")
}

/// Simulated office for coding agents - walks them between elevator, queues, boss and desks
#[derive(Parser, Debug)]
#[command(name = "agent-office")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Socket path for backend messages (default: $XDG_RUNTIME_DIR/agent-office.sock or /tmp/agent-office.sock)
    #[arg(
        short,
        long,
        env = "AGENT_OFFICE_SOCKET",
        default_value_os_t = default_socket_path(),
        global = true
    )]
    pub socket: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Frame rate in frames per second (default: from config, 60.0)
    #[arg(short = 'F', long, global = true)]
    pub frame_rate: Option<f64>,

    /// Config file (default: ~/.config/agent-office/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen for backend messages and animate the office (default)
    Run {
        /// Print a snapshot JSON line to stdout every emit interval
        #[arg(long, default_value_t = false)]
        emit: bool,

        /// Milliseconds between emitted snapshots
        #[arg(long, default_value_t = 1000)]
        emit_interval_ms: u64,
    },

    /// Run a scripted headless scenario and print the phase log
    ///
    /// Agents arrive one after another, work for a while, then leave. Time
    /// is simulated, so a minute of office life takes milliseconds.
    Simulate {
        /// Number of agents
        #[arg(short = 'n', long, default_value_t = 3)]
        agents: usize,

        /// Simulated seconds to run
        #[arg(long, default_value_t = 120)]
        seconds: u64,

        /// Print the final snapshot as JSON instead of the phase log
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the office grid as ASCII
    Grid,

    /// Print an example config file
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Generate shell completions and print to stdout
pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "agent-office", &mut io::stdout());
}
