//! The runtime an engine runs in: construct a process for a candidate, send it
//! text, receive its output lines and errors, terminate it.

use tokio::sync::mpsc;

use crate::candidates::{Capabilities, EngineCandidate};

/// Output from a running engine process, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    /// One line of engine output, trimmed.
    Line(String),
    /// The process reported a runtime error.
    Error(String),
    /// The process went away (stdout closed).
    Exited,
}

/// A freshly constructed engine process and its output stream.
pub struct SpawnedProcess {
    pub process: Box<dyn EngineProcess>,
    pub output: mpsc::Receiver<ProcessOutput>,
}

/// A live engine process. Commands are fire-and-forget.
pub trait EngineProcess: Send {
    fn send(&mut self, line: &str) -> Result<(), ProcessError>;

    /// Stop the process. Safe to call more than once.
    fn terminate(&mut self);
}

/// Constructs engine processes.
pub trait EngineHost: Send + Sync + 'static {
    fn spawn(&self, candidate: &EngineCandidate) -> Result<SpawnedProcess, SpawnError>;

    fn capabilities(&self) -> Capabilities {
        Capabilities::probe()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The host cannot run engine processes at all. No candidate will work.
    #[error("engine processes are not supported here: {0}")]
    Unsupported(String),
    /// This candidate could not be started; the next one may.
    #[error("failed to launch {label}: {reason}")]
    Launch { label: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("engine process is closed")]
    Closed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
