use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use super::actor::{run_supervisor, SupervisorState};
use super::commands::SupervisorCommand;
use super::listener::{Listener, Registry};
use super::{EngineLink, EngineStatus, SupervisorError};
use crate::candidates::{select_candidates, CandidateSet, Capabilities, EngineCandidate};
use crate::config::EngineSettings;
use crate::host::EngineHost;
use crate::process::ProcessHost;
use crate::uci::UciCommand;

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// How long a started candidate gets to acknowledge `uci`/`isready`.
    pub init_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            init_timeout: EngineSettings::default().init_timeout,
        }
    }
}

/// Cheap, cloneable handle to the engine supervisor actor.
///
/// Every clone talks to the same engine process; consumers receive a clone
/// rather than reaching for global state.
#[derive(Clone)]
pub struct EngineSupervisor {
    cmd_tx: mpsc::Sender<SupervisorCommand>,
    status_rx: watch::Receiver<EngineStatus>,
    registry: Registry,
}

impl EngineSupervisor {
    /// Start the supervisor actor on the current runtime. No engine process
    /// is started until the first [`acquire`](Self::acquire).
    pub fn spawn(
        host: Arc<dyn EngineHost>,
        candidates: Vec<EngineCandidate>,
        options: SupervisorOptions,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (status_tx, status_rx) = watch::channel(EngineStatus::Uninitialized);
        let (registry_tx, _) = watch::channel(None);
        let registry = Arc::new(registry_tx);

        let state = SupervisorState::new(
            host,
            candidates,
            options.init_timeout,
            status_tx,
            registry.clone(),
        );
        tokio::spawn(run_supervisor(state, cmd_rx));

        Self {
            cmd_tx,
            status_rx,
            registry,
        }
    }

    /// Candidates from `set`, filtered by what `host` reports it can run.
    pub fn with_host(
        host: Arc<dyn EngineHost>,
        set: &CandidateSet,
        options: SupervisorOptions,
    ) -> Self {
        let candidates = select_candidates(set, host.capabilities());
        Self::spawn(host, candidates, options)
    }

    /// Supervisor over native child processes, candidates chosen from
    /// `settings` and the host's capabilities.
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let caps = Capabilities::from_settings(settings);
        let candidates = select_candidates(&CandidateSet::from_settings(settings), caps);
        Self::spawn(
            Arc::new(ProcessHost),
            candidates,
            SupervisorOptions {
                init_timeout: settings.init_timeout,
            },
        )
    }

    /// Get a ready engine, starting one if needed.
    ///
    /// Resolves once a candidate acknowledged the handshake, or with `None`
    /// when every candidate failed (or the host cannot run engines). Never
    /// blocks the thread.
    pub async fn acquire(&self) -> Option<EngineLink> {
        let (tx, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(SupervisorCommand::Acquire { reply: tx })
            .await
            .is_err()
        {
            tracing::warn!("Engine requested after supervisor shut down");
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Write `commands` to the engine behind `link`, back to back. Dropped
    /// silently if that engine has been replaced since.
    pub async fn send(
        &self,
        link: &EngineLink,
        commands: &[UciCommand],
    ) -> Result<(), SupervisorError> {
        let lines = commands.iter().map(ToString::to_string).collect();
        self.cmd_tx
            .send(SupervisorCommand::Send {
                generation: link.generation,
                lines,
            })
            .await
            .map_err(|_| SupervisorError::Closed)
    }

    /// Terminate the engine and forget all progress; the next
    /// [`acquire`](Self::acquire) starts again from the first candidate.
    pub async fn hard_reset(&self) -> Result<(), SupervisorError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(SupervisorCommand::HardReset { reply: tx })
            .await
            .map_err(|_| SupervisorError::Closed)?;
        rx.await.map_err(|_| SupervisorError::Closed)
    }

    /// Subscribe to every line the engine prints, across restarts.
    pub fn listen(&self) -> Listener {
        Listener::new(&self.registry)
    }

    /// Number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.receiver_count()
    }

    pub fn status(&self) -> EngineStatus {
        self.status_rx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.status_rx.clone()
    }

    /// Terminate the engine and stop the actor. Other handles see
    /// `acquire` return `None` afterwards.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SupervisorCommand::Shutdown).await;
    }
}
