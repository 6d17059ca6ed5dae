//! Evaluation sessions: one per consumer of the shared engine.

mod actor;
mod handle;

pub use handle::EvalSession;

use std::time::Duration;

use chess::Evaluation;

use crate::config::EngineSettings;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Accepted for callers that think in depth; the search is bounded by
    /// `movetime` regardless.
    pub depth: Option<u8>,
    /// Search budget per position.
    pub movetime: Duration,
    /// After this long without `bestmove`, the session stops reporting
    /// `thinking`.
    pub safety_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl SessionOptions {
    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self {
            depth: None,
            movetime: settings.movetime,
            safety_timeout: settings.safety_timeout,
        }
    }
}

/// What a session currently shows.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSnapshot {
    /// Latest evaluation, positive favours White.
    pub evaluation: Option<Evaluation>,
    /// A search for the current position is in flight.
    pub thinking: bool,
    /// False once the engine turned out to be unavailable for the last request.
    pub available: bool,
    /// Depth of the line that produced `evaluation`.
    pub depth: Option<u8>,
    /// Number of observations the session has processed.
    pub revision: u64,
}

impl Default for EvalSnapshot {
    fn default() -> Self {
        Self {
            evaluation: None,
            thinking: false,
            available: true,
            depth: None,
            revision: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("evaluation session is unmounted")]
    Unmounted,
}

/// Messages from the session handle to its actor.
pub(crate) enum SessionCommand {
    Observe {
        position: Option<String>,
        refresh_token: u64,
    },
}
