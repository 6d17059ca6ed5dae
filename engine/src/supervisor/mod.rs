//! The process supervisor: one shared engine process, its lifecycle state
//! machine and the fan-out of its output lines.

mod actor;
mod commands;
mod handle;
mod listener;

pub use handle::{EngineSupervisor, SupervisorOptions};
pub use listener::{EngineLine, Listener};

use std::fmt;

/// Lifecycle of the shared engine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// No process and none requested yet (or after a hard reset).
    Uninitialized,
    /// Candidate `candidate` is running and has not acknowledged the handshake.
    Starting { candidate: usize },
    /// Candidate `candidate` acknowledged the handshake.
    Ready { candidate: usize },
    /// Every candidate failed in the current demand cycle.
    Failed,
    /// The host cannot run engine processes at all.
    Unsupported,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "idle"),
            Self::Starting { candidate } => write!(f, "starting (candidate {})", candidate),
            Self::Ready { candidate } => write!(f, "ready (candidate {})", candidate),
            Self::Failed => write!(f, "unavailable"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Proof that a specific process generation was ready when it was handed out.
/// Commands sent through a link to a process that has since been replaced
/// are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLink {
    pub generation: u64,
    pub candidate: usize,
    pub label: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("engine supervisor has shut down")]
    Closed,
}
