//! Scripted in-memory engine host for tests.
//!
//! Each candidate label maps to a [`Behavior`]; every spawned process records
//! the lines it was sent, and tests can push output into the latest process
//! by hand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::candidates::{Capabilities, EngineCandidate};
use crate::host::{EngineHost, EngineProcess, ProcessError, ProcessOutput, SpawnError, SpawnedProcess};

const OUTPUT_BUFFER: usize = 256;

/// How a scripted candidate behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Acknowledges the handshake and answers each `go` with `search`,
    /// followed by `bestmove e2e4` when `bestmove` is set.
    Healthy { search: Vec<String>, bestmove: bool },
    /// Starts but never prints anything.
    Mute,
    /// Acknowledges the handshake, then reports an error on the first `go`.
    CrashOnGo,
    /// Construction fails for this candidate.
    LaunchFails,
    /// Construction reports that the host cannot run engines at all.
    Unsupported,
}

impl Behavior {
    /// Healthy engine reporting `score cp 35` for every search.
    pub fn healthy() -> Self {
        Self::answering(["info depth 12 score cp 35 nodes 1000 pv e2e4"])
    }

    /// Healthy engine answering every search with `lines` and a bestmove.
    pub fn answering<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Healthy {
            search: lines.into_iter().map(Into::into).collect(),
            bestmove: true,
        }
    }

    /// Healthy engine that accepts searches and never answers them.
    pub fn silent_search() -> Self {
        Self::Healthy {
            search: Vec::new(),
            bestmove: false,
        }
    }
}

struct ScriptedRecord {
    label: String,
    behavior: Behavior,
    sent: Vec<String>,
    output: mpsc::Sender<ProcessOutput>,
    terminated: bool,
}

#[derive(Default)]
struct Inner {
    default_behavior: Option<Behavior>,
    behaviors: HashMap<String, Behavior>,
    spawn_attempts: Vec<String>,
    processes: Vec<ScriptedRecord>,
    shared_memory: bool,
}

impl Inner {
    fn behavior_for(&self, label: &str) -> Behavior {
        self.behaviors
            .get(label)
            .or(self.default_behavior.as_ref())
            .cloned()
            .unwrap_or_else(Behavior::healthy)
    }
}

/// Cloneable scripted host; clones share one script and one record.
#[derive(Clone, Default)]
pub struct ScriptedHost {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Behavior for candidates without an explicit one.
    pub fn with_default(self, behavior: Behavior) -> Self {
        self.lock().default_behavior = Some(behavior);
        self
    }

    pub fn with_behavior(self, label: &str, behavior: Behavior) -> Self {
        self.set_behavior(label, behavior);
        self
    }

    pub fn with_shared_memory(self, shared_memory: bool) -> Self {
        self.lock().shared_memory = shared_memory;
        self
    }

    /// Change a candidate's behavior for processes spawned from now on.
    pub fn set_behavior(&self, label: &str, behavior: Behavior) {
        self.lock().behaviors.insert(label.to_string(), behavior);
    }

    /// Labels of every spawn attempt, in order, including failed ones.
    pub fn spawn_attempts(&self) -> Vec<String> {
        self.lock().spawn_attempts.clone()
    }

    /// Labels of every process that was constructed, in order.
    pub fn spawned(&self) -> Vec<String> {
        self.lock().processes.iter().map(|p| p.label.clone()).collect()
    }

    /// Lines sent to the `index`th constructed process.
    pub fn sent(&self, index: usize) -> Vec<String> {
        self.lock()
            .processes
            .get(index)
            .map(|p| p.sent.clone())
            .unwrap_or_default()
    }

    /// Lines sent to the most recently constructed process.
    pub fn sent_to_latest(&self) -> Vec<String> {
        self.lock()
            .processes
            .last()
            .map(|p| p.sent.clone())
            .unwrap_or_default()
    }

    pub fn terminated_count(&self) -> usize {
        self.lock().processes.iter().filter(|p| p.terminated).count()
    }

    /// Processes that were constructed and not terminated.
    pub fn live_count(&self) -> usize {
        self.lock().processes.iter().filter(|p| !p.terminated).count()
    }

    /// Push an output line from the latest process.
    pub fn emit(&self, line: &str) {
        self.push(ProcessOutput::Line(line.to_string()));
    }

    /// Report a runtime error from the latest process.
    pub fn crash(&self, reason: &str) {
        self.push(ProcessOutput::Error(reason.to_string()));
    }

    fn push(&self, output: ProcessOutput) {
        let inner = self.lock();
        if let Some(record) = inner.processes.last() {
            let _ = record.output.try_send(output);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EngineHost for ScriptedHost {
    fn spawn(&self, candidate: &EngineCandidate) -> Result<SpawnedProcess, SpawnError> {
        let mut inner = self.lock();
        inner.spawn_attempts.push(candidate.label.clone());

        let behavior = inner.behavior_for(&candidate.label);
        match behavior {
            Behavior::Unsupported => {
                return Err(SpawnError::Unsupported("scripted host".to_string()));
            }
            Behavior::LaunchFails => {
                return Err(SpawnError::Launch {
                    label: candidate.label.clone(),
                    reason: "scripted launch failure".to_string(),
                });
            }
            _ => {}
        }

        let (output, output_rx) = mpsc::channel(OUTPUT_BUFFER);
        let index = inner.processes.len();
        inner.processes.push(ScriptedRecord {
            label: candidate.label.clone(),
            behavior,
            sent: Vec::new(),
            output,
            terminated: false,
        });

        Ok(SpawnedProcess {
            process: Box::new(ScriptedProcess {
                inner: self.inner.clone(),
                index,
            }),
            output: output_rx,
        })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            shared_memory: self.lock().shared_memory,
        }
    }
}

struct ScriptedProcess {
    inner: Arc<Mutex<Inner>>,
    index: usize,
}

impl EngineProcess for ScriptedProcess {
    fn send(&mut self, line: &str) -> Result<(), ProcessError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = inner.processes.get_mut(self.index) else {
            return Err(ProcessError::Closed);
        };
        if record.terminated {
            return Err(ProcessError::Closed);
        }
        record.sent.push(line.to_string());

        for output in reply(&record.behavior, line) {
            let _ = record.output.try_send(output);
        }
        Ok(())
    }

    fn terminate(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = inner.processes.get_mut(self.index) {
            record.terminated = true;
        }
    }
}

fn reply(behavior: &Behavior, line: &str) -> Vec<ProcessOutput> {
    let command = line.split_whitespace().next().unwrap_or_default();
    let handshake = |command: &str| match command {
        "uci" => vec![
            ProcessOutput::Line("id name Scripted".to_string()),
            ProcessOutput::Line("uciok".to_string()),
        ],
        "isready" => vec![ProcessOutput::Line("readyok".to_string())],
        _ => Vec::new(),
    };

    match behavior {
        Behavior::Healthy { search, bestmove } => match command {
            "go" => {
                let mut out: Vec<ProcessOutput> = search
                    .iter()
                    .map(|l| ProcessOutput::Line(l.clone()))
                    .collect();
                if *bestmove {
                    out.push(ProcessOutput::Line("bestmove e2e4".to_string()));
                }
                out
            }
            other => handshake(other),
        },
        Behavior::CrashOnGo => match command {
            "go" => vec![ProcessOutput::Error("scripted crash".to_string())],
            other => handshake(other),
        },
        Behavior::Mute | Behavior::LaunchFails | Behavior::Unsupported => Vec::new(),
    }
}

/// Candidate labelled `label`, for scripted hosts.
pub fn candidate(label: &str) -> EngineCandidate {
    EngineCandidate::portable(label).with_label(label)
}
