//! Runtime tunables for the engine supervisor and evaluation sessions.
//!
//! Every value has a compile-time default and can be overridden at runtime
//! via a dedicated environment variable. The CLI layers its own flags on top
//! of [`EngineSettings::from_env`].

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Executables probed, in order, when `EVALBAR_ENGINE_PATHS` is not set.
const DEFAULT_ENGINE_PATHS: &[&str] = &[
    "/usr/local/bin/stockfish",
    "/usr/bin/stockfish",
    "/opt/homebrew/bin/stockfish",
    "/usr/games/stockfish",
];

/// Bare program name resolved through `PATH`, always tried last.
const PATH_ENGINE: &str = "stockfish";

/// Default bound for a candidate to acknowledge the UCI handshake.
const DEFAULT_INIT_TIMEOUT_MS: u64 = 2500;

/// Default search budget per position. The bar is interactive, not deep analysis.
const DEFAULT_MOVETIME_MS: u64 = 250;

/// Default time after which a search without `bestmove` stops counting as thinking.
const DEFAULT_SAFETY_TIMEOUT_MS: u64 = 2600;

/// Default directory for the TUI's rolling log files.
const DEFAULT_LOG_DIR: &str = "logs";

/// Resolved settings for one supervisor and the sessions that share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Engine executables, most broadly compatible first.
    pub engine_paths: Vec<PathBuf>,
    /// Thread count for the shared-memory candidate.
    pub threads: u32,
    /// Forces the shared-memory capability on or off instead of probing.
    pub shared_memory: Option<bool>,
    pub init_timeout: Duration,
    pub movetime: Duration,
    pub safety_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine_paths: default_engine_paths(),
            threads: available_threads(),
            shared_memory: None,
            init_timeout: Duration::from_millis(DEFAULT_INIT_TIMEOUT_MS),
            movetime: Duration::from_millis(DEFAULT_MOVETIME_MS),
            safety_timeout: Duration::from_millis(DEFAULT_SAFETY_TIMEOUT_MS),
        }
    }
}

impl EngineSettings {
    pub fn from_env() -> Self {
        Self {
            engine_paths: get_engine_paths(),
            threads: get_engine_threads(),
            shared_memory: get_shared_memory_override(),
            init_timeout: Duration::from_millis(get_millis(
                "EVALBAR_INIT_TIMEOUT_MS",
                DEFAULT_INIT_TIMEOUT_MS,
            )),
            movetime: Duration::from_millis(get_millis("EVALBAR_MOVETIME_MS", DEFAULT_MOVETIME_MS)),
            safety_timeout: Duration::from_millis(get_millis(
                "EVALBAR_SAFETY_TIMEOUT_MS",
                DEFAULT_SAFETY_TIMEOUT_MS,
            )),
        }
    }
}

/// Get the ordered list of engine executables.
///
/// Priority:
/// 1. `EVALBAR_ENGINE_PATHS` env variable if set (platform path-list syntax,
///    `:`-separated on Unix)
/// 2. The well-known install locations that exist, then `stockfish` on `PATH`
pub fn get_engine_paths() -> Vec<PathBuf> {
    if let Some(paths) = std::env::var_os("EVALBAR_ENGINE_PATHS") {
        let paths: Vec<PathBuf> = std::env::split_paths(&paths)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if !paths.is_empty() {
            return paths;
        }
    }

    default_engine_paths()
}

fn default_engine_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = DEFAULT_ENGINE_PATHS
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .map(Path::to_path_buf)
        .collect();
    paths.push(PathBuf::from(PATH_ENGINE));
    paths
}

/// Get the thread count for the shared-memory candidate.
///
/// Priority:
/// 1. `EVALBAR_ENGINE_THREADS` env variable if set and a positive integer
/// 2. The host's available parallelism
pub fn get_engine_threads() -> u32 {
    std::env::var("EVALBAR_ENGINE_THREADS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(available_threads)
}

fn available_threads() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Get the shared-memory capability override.
///
/// `EVALBAR_SHARED_MEMORY` accepts `1`/`true`/`yes` and `0`/`false`/`no`;
/// anything else (or unset) means "probe the host".
pub fn get_shared_memory_override() -> Option<bool> {
    let value = std::env::var("EVALBAR_SHARED_MEMORY").ok()?;
    parse_flag(&value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn get_millis(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Get the directory for rolling log files.
///
/// Priority:
/// 1. `EVALBAR_LOG_DIR` env variable if set
/// 2. `./logs` as fallback
pub fn get_log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("EVALBAR_LOG_DIR") {
        return PathBuf::from(dir);
    }

    PathBuf::from(DEFAULT_LOG_DIR)
}
