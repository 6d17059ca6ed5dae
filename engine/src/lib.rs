//! Supervised UCI engine evaluation.
//!
//! One [`EngineSupervisor`] owns at most one live engine process and walks an
//! ordered list of [`EngineCandidate`]s until one of them answers the UCI
//! handshake. Any number of [`EvalSession`]s share that process: each submits
//! analysis for its own position and turns the engine's output into an
//! [`EvalSnapshot`].

pub mod candidates;
pub mod config;
pub mod host;
pub mod process;
pub mod session;
pub mod supervisor;
pub mod uci;

#[cfg(any(test, feature = "mock"))]
pub mod testing;

pub use candidates::{select_candidates, Capabilities, CandidateSet, EngineCandidate};
pub use config::EngineSettings;
pub use host::{EngineHost, EngineProcess, ProcessError, ProcessOutput, SpawnError, SpawnedProcess};
pub use process::ProcessHost;
pub use session::{EvalSession, EvalSnapshot, SessionError, SessionOptions};
pub use supervisor::{
    EngineLine, EngineLink, EngineStatus, EngineSupervisor, Listener, SupervisorError,
    SupervisorOptions,
};
pub use uci::{GoParams, UciCommand, UciError, UciMessage};

use chess::RelativeScore;
use cozy_chess::Move;

/// Engine analysis information
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u8>,
    pub seldepth: Option<u8>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    /// Relative to the side to move.
    pub score: Option<RelativeScore>,
    pub pv: Vec<Move>, // Principal variation
    pub multipv: Option<u8>,
    pub currmove: Option<Move>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
}
