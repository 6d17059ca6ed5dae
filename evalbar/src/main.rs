//! evalbar: live engine evaluation for chess positions.
//!
//! `eval` prints one evaluation per position, `watch` shows an interactive
//! evaluation bar, `candidates` lists the engine builds that would be tried.
//! All commands share the engine settings below, layered over the
//! `EVALBAR_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use engine::EngineSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod ui;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Parser)]
#[command(name = "evalbar", about = "Supervised UCI engine evaluation bar")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate each position once and print the result.
    Eval {
        /// Positions in FEN.
        #[arg(required = true)]
        fens: Vec<String>,

        /// Print one JSON object per position.
        #[arg(long)]
        json: bool,
    },
    /// Interactive evaluation bar. Left/right switch positions, `r` restarts
    /// the engine, `c` clears the position, `q` quits.
    Watch {
        /// Positions in FEN. Defaults to the starting position.
        fens: Vec<String>,
    },
    /// List the engine candidates in the order they would be tried.
    Candidates,
}

/// Engine flags accepted by every subcommand.
#[derive(Args, Debug, Default)]
struct EngineArgs {
    /// Engine executable, most compatible first. Repeat for fallbacks;
    /// replaces `EVALBAR_ENGINE_PATHS`.
    #[arg(long = "engine", global = true)]
    engines: Vec<PathBuf>,

    /// Search threads for the shared-memory build.
    #[arg(long, global = true)]
    threads: Option<u32>,

    /// Never try the shared-memory build.
    #[arg(long, global = true)]
    no_shared_memory: bool,

    /// Search time per position in milliseconds.
    #[arg(long, global = true)]
    movetime_ms: Option<u64>,

    /// How long a build gets to answer the UCI handshake, in milliseconds.
    #[arg(long, global = true)]
    init_timeout_ms: Option<u64>,
}

impl EngineArgs {
    fn apply(&self, mut settings: EngineSettings) -> EngineSettings {
        if !self.engines.is_empty() {
            settings.engine_paths = self.engines.clone();
        }
        if let Some(threads) = self.threads.filter(|n| *n > 0) {
            settings.threads = threads;
        }
        if self.no_shared_memory {
            settings.shared_memory = Some(false);
        }
        if let Some(ms) = self.movetime_ms {
            settings.movetime = Duration::from_millis(ms);
        }
        if let Some(ms) = self.init_timeout_ms {
            settings.init_timeout = Duration::from_millis(ms);
        }
        settings
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to stderr so stdout stays clean for results.
fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter())
        .init();
}

/// Log to a daily rolling file; the terminal belongs to the TUI.
fn init_file_logging(log_dir: &Path) -> WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "evalbar");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(env_filter())
        .init();
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.engine.apply(EngineSettings::from_env());

    match cli.command {
        Commands::Eval { fens, json } => {
            init_stderr_logging();
            commands::run_eval(&settings, &fens, json).await
        }
        Commands::Watch { fens } => {
            let log_dir = engine::config::get_log_dir();
            let _guard = init_file_logging(&log_dir);
            tracing::info!("evalbar watch starting up");

            let fens = if fens.is_empty() {
                vec![START_FEN.to_string()]
            } else {
                fens
            };
            println!("Debug logs: {}/evalbar.YYYY-MM-DD", log_dir.display());
            let result = ui::run_app(&settings, fens).await;

            tracing::info!("evalbar watch shutting down");
            result
        }
        Commands::Candidates => {
            init_stderr_logging();
            commands::print_candidates(&settings);
            Ok(())
        }
    }
}
