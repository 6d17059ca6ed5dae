//! Engine build candidates and the capability-driven order they are tried in.

use std::fmt;
use std::path::PathBuf;

use crate::config::EngineSettings;

/// One alternative engine build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCandidate {
    pub label: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// `Some(n)` marks a shared-memory build that is told to search with `n`
    /// threads during the handshake.
    pub threads: Option<u32>,
}

impl EngineCandidate {
    /// Single-threaded build, runs anywhere the executable does.
    pub fn portable(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        Self {
            label: program.display().to_string(),
            program,
            args: Vec::new(),
            threads: None,
        }
    }

    /// Multi-threaded build that needs shared memory between search threads.
    pub fn threaded(program: impl Into<PathBuf>, threads: u32) -> Self {
        let program = program.into();
        Self {
            label: format!("{} (threads={})", program.display(), threads),
            program,
            args: Vec::new(),
            threads: Some(threads),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_threaded(&self) -> bool {
        self.threads.is_some()
    }
}

impl fmt::Display for EngineCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// What the host can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Search threads can share memory, so a multi-threaded build is eligible.
    pub shared_memory: bool,
}

impl Capabilities {
    /// Probe the host: shared-memory search only pays off with more than one
    /// hardware thread.
    pub fn probe() -> Self {
        let shared_memory = std::thread::available_parallelism()
            .map(|n| n.get() > 1)
            .unwrap_or(false);
        Self { shared_memory }
    }

    /// Probe unless the settings force an answer.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        match settings.shared_memory {
            Some(shared_memory) => Self { shared_memory },
            None => Self::probe(),
        }
    }
}

/// Every known build, before capability filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    /// Single-threaded builds in preference order.
    pub portable: Vec<EngineCandidate>,
    /// The shared-memory build, eligible only when the host supports it.
    pub threaded: Option<EngineCandidate>,
}

impl CandidateSet {
    /// One portable candidate per configured executable; the threaded build
    /// reuses the first executable with the configured thread count.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let portable = settings
            .engine_paths
            .iter()
            .map(|path| EngineCandidate::portable(path.clone()))
            .collect();
        let threaded = match settings.engine_paths.first() {
            Some(path) if settings.threads > 1 => {
                Some(EngineCandidate::threaded(path.clone(), settings.threads))
            }
            _ => None,
        };
        Self { portable, threaded }
    }
}

/// Order candidates most-compatible first. The shared-memory build goes last
/// and only when `caps` allows it.
pub fn select_candidates(set: &CandidateSet, caps: Capabilities) -> Vec<EngineCandidate> {
    let mut candidates = set.portable.clone();
    if caps.shared_memory {
        if let Some(threaded) = &set.threaded {
            candidates.push(threaded.clone());
        }
    }
    tracing::debug!(
        count = candidates.len(),
        shared_memory = caps.shared_memory,
        "Selected engine candidates"
    );
    candidates
}
