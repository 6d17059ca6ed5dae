use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::actor::{run_session_actor, SessionState};
use super::{EvalSnapshot, SessionCommand, SessionError, SessionOptions};
use crate::supervisor::EngineSupervisor;

/// One consumer's view of the shared engine.
///
/// Feed it positions with [`observe`](Self::observe) and read the
/// continuously updated [`EvalSnapshot`]. Dropping the session unmounts it.
pub struct EvalSession {
    id: Uuid,
    cmd_tx: Option<mpsc::Sender<SessionCommand>>,
    snapshot_rx: watch::Receiver<EvalSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl EvalSession {
    /// Subscribe to the shared engine's output and start the session actor.
    /// Does not start the engine.
    pub fn mount(supervisor: &EngineSupervisor, options: SessionOptions) -> Self {
        let id = Uuid::new_v4();
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = watch::channel(EvalSnapshot::default());

        let state = SessionState::new(
            supervisor.clone(),
            supervisor.listen(),
            options,
            snapshot_tx,
        );
        let task = tokio::spawn(run_session_actor(id, state, cmd_rx));

        Self {
            id,
            cmd_tx: Some(cmd_tx),
            snapshot_rx,
            task: Some(task),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Analyse `position` (a FEN), or clear the session with `None`.
    ///
    /// A `refresh_token` different from the previous call's hard-resets the
    /// shared engine before the position is submitted. Repeating the same
    /// position and token is a no-op.
    pub async fn observe(
        &self,
        position: Option<&str>,
        refresh_token: u64,
    ) -> Result<(), SessionError> {
        let cmd_tx = self.cmd_tx.as_ref().ok_or(SessionError::Unmounted)?;
        cmd_tx
            .send(SessionCommand::Observe {
                position: position.map(str::to_string),
                refresh_token,
            })
            .await
            .map_err(|_| SessionError::Unmounted)
    }

    pub fn snapshot(&self) -> EvalSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EvalSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until `revision` observations are processed and no search is in
    /// flight.
    pub async fn settled(&self, revision: u64) -> EvalSnapshot {
        let mut rx = self.snapshot_rx.clone();
        let result = rx
            .wait_for(|s| s.revision >= revision && !s.thinking)
            .await
            .map(|s| s.clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.cmd_tx.is_some()
    }

    /// Stop listening and cancel the pending safety timer. The shared engine
    /// keeps running. Calling this again does nothing.
    ///
    /// Returns promptly even while the actor waits for an engine to start.
    pub async fn unmount(&mut self) {
        if self.cmd_tx.take().is_none() {
            return;
        }
        if let Some(task) = self.task.take() {
            task.abort();
            match task.await {
                Err(e) if !e.is_cancelled() => {
                    tracing::warn!(id = %self.id, "Session actor ended abnormally: {}", e);
                }
                _ => tracing::debug!(id = %self.id, "Evaluation session unmounted"),
            }
        }
    }
}
