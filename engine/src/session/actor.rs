use chess::{normalize, side_to_move, Side};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::Instrument;
use uuid::Uuid;

use super::{EvalSnapshot, SessionCommand, SessionOptions};
use crate::supervisor::{EngineLine, EngineSupervisor, Listener};
use crate::uci::{parse_uci_message, GoParams, UciCommand, UciMessage};

struct ObservedPosition {
    fen: String,
    side: Side,
}

/// Safety timer for one request. Firing with a superseded `seq` does nothing.
#[derive(Debug, Clone, Copy)]
struct SafetyTimer {
    seq: u64,
    deadline: Instant,
}

pub(crate) struct SessionState {
    supervisor: EngineSupervisor,
    listener: Listener,
    options: SessionOptions,
    position: Option<ObservedPosition>,
    last_observed: Option<(Option<String>, u64)>,
    seq: u64,
    safety: Option<SafetyTimer>,
    snapshot_tx: watch::Sender<EvalSnapshot>,
}

impl SessionState {
    pub(crate) fn new(
        supervisor: EngineSupervisor,
        listener: Listener,
        options: SessionOptions,
        snapshot_tx: watch::Sender<EvalSnapshot>,
    ) -> Self {
        Self {
            supervisor,
            listener,
            options,
            position: None,
            last_observed: None,
            seq: 0,
            safety: None,
            snapshot_tx,
        }
    }

    async fn handle_observe(&mut self, position: Option<String>, refresh_token: u64) {
        let observed = (position, refresh_token);
        if self.last_observed.as_ref() == Some(&observed) {
            tracing::trace!("Position and refresh token unchanged");
        } else {
            let token_changed = self
                .last_observed
                .as_ref()
                .is_some_and(|(_, token)| *token != refresh_token);
            self.last_observed = Some(observed.clone());
            self.submit(observed.0, token_changed).await;
        }
        self.snapshot_tx.send_modify(|s| s.revision += 1);
    }

    async fn submit(&mut self, position: Option<String>, token_changed: bool) {
        let Some(fen) = position else {
            tracing::debug!("Position cleared");
            self.clear(true);
            return;
        };

        let side = match side_to_move(&fen) {
            Ok(side) => side,
            Err(e) => {
                tracing::warn!(fen = %fen, "Not analysing position: {}", e);
                self.clear(true);
                return;
            }
        };

        if token_changed {
            tracing::info!("Refresh token changed, resetting engine");
            if let Err(e) = self.supervisor.hard_reset().await {
                tracing::warn!("Engine reset failed: {}", e);
            }
        }

        let Some(link) = self.supervisor.acquire().await else {
            tracing::warn!("Engine unavailable");
            self.clear(false);
            return;
        };
        self.listener.follow();

        self.seq += 1;
        let seq = self.seq;
        let commands = [
            UciCommand::Stop,
            UciCommand::Position { fen: fen.clone() },
            UciCommand::Go(GoParams::movetime(self.options.movetime.as_millis() as u64)),
        ];
        if let Err(e) = self.supervisor.send(&link, &commands).await {
            tracing::warn!("Could not submit analysis: {}", e);
            self.clear(false);
            return;
        }

        tracing::debug!(
            seq,
            generation = link.generation,
            listening = ?self.listener.generation(),
            side = %side,
            depth = ?self.options.depth,
            "Analysis submitted"
        );
        self.position = Some(ObservedPosition { fen, side });
        self.safety = Some(SafetyTimer {
            seq,
            deadline: Instant::now() + self.options.safety_timeout,
        });
        // The previous position's score says nothing about this one.
        self.snapshot_tx.send_modify(|s| {
            s.evaluation = None;
            s.depth = None;
            s.thinking = true;
            s.available = true;
        });
    }

    /// Drop the current request. `available` is what the caller learned
    /// about the engine; an explicit clear keeps the engine available.
    fn clear(&mut self, available: bool) {
        self.position = None;
        self.safety = None;
        self.snapshot_tx.send_modify(|s| {
            s.evaluation = None;
            s.depth = None;
            s.thinking = false;
            s.available = available;
        });
    }

    fn handle_line(&mut self, line: &EngineLine) {
        match parse_uci_message(&line.text) {
            // Stop, reposition and go are sent together, so any bestmove
            // ends the latest search.
            Ok(UciMessage::BestMove { .. }) => {
                self.safety = None;
                self.snapshot_tx.send_if_modified(|s| {
                    let was_thinking = s.thinking;
                    s.thinking = false;
                    was_thinking
                });
            }
            Ok(UciMessage::Info(info)) => {
                let (Some(score), Some(position)) = (info.score, self.position.as_ref()) else {
                    return;
                };
                let evaluation = normalize(score, position.side);
                tracing::trace!(fen = %position.fen, %evaluation, depth = ?info.depth, "Evaluation");
                self.snapshot_tx.send_if_modified(|s| {
                    let changed = s.evaluation != Some(evaluation) || s.depth != info.depth;
                    s.evaluation = Some(evaluation);
                    s.depth = info.depth;
                    changed
                });
            }
            _ => {}
        }
    }

    fn handle_safety_timeout(&mut self, timer: SafetyTimer) {
        if timer.seq != self.seq {
            tracing::trace!(seq = timer.seq, current = self.seq, "Stale safety timer");
            return;
        }
        self.safety = None;
        tracing::warn!(seq = timer.seq, "No bestmove before safety timeout");
        self.snapshot_tx.send_modify(|s| s.thinking = false);
    }
}

/// The session actor loop. Exits when the handle unmounts.
pub(crate) async fn run_session_actor(
    id: Uuid,
    state: SessionState,
    cmd_rx: mpsc::Receiver<SessionCommand>,
) {
    run_session_actor_inner(state, cmd_rx)
        .instrument(tracing::info_span!("eval_session", id = %id))
        .await;
}

async fn run_session_actor_inner(
    mut state: SessionState,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
) {
    tracing::debug!("Evaluation session mounted");

    loop {
        let safety = state.safety;

        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Observe { position, refresh_token }) => {
                        state.handle_observe(position, refresh_token).await;
                    }
                    None => break,
                }
            }

            line = state.listener.recv() => {
                state.handle_line(&line);
            }

            _ = time::sleep_until(safety.map_or_else(Instant::now, |t| t.deadline)), if safety.is_some() => {
                if let Some(timer) = safety {
                    state.handle_safety_timeout(timer);
                }
            }
        }
    }

    tracing::debug!("Evaluation session unmounted");
}
