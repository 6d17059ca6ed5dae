use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::Instrument;

use super::commands::SupervisorCommand;
use super::listener::{EngineLine, LineChannel, Registry};
use super::{EngineLink, EngineStatus};
use crate::candidates::EngineCandidate;
use crate::host::{EngineHost, EngineProcess, ProcessOutput, SpawnError, SpawnedProcess};
use crate::uci::{parse_uci_message, UciCommand};

/// Lines buffered per listener before it starts lagging.
const LINE_BUFFER: usize = 512;

enum Lifecycle {
    Uninitialized,
    Starting { index: usize, deadline: Instant },
    Ready { index: usize },
    Failed,
    Unsupported,
}

struct LiveProcess {
    generation: u64,
    index: usize,
    process: Box<dyn EngineProcess>,
    output: mpsc::Receiver<ProcessOutput>,
    lines: broadcast::Sender<EngineLine>,
}

/// All supervisor state. Only the actor task touches it.
pub(crate) struct SupervisorState {
    host: Arc<dyn EngineHost>,
    candidates: Vec<EngineCandidate>,
    init_timeout: Duration,
    lifecycle: Lifecycle,
    process: Option<LiveProcess>,
    waiters: Vec<oneshot::Sender<Option<EngineLink>>>,
    next_generation: u64,
    status_tx: watch::Sender<EngineStatus>,
    registry: Registry,
}

impl SupervisorState {
    pub(crate) fn new(
        host: Arc<dyn EngineHost>,
        candidates: Vec<EngineCandidate>,
        init_timeout: Duration,
        status_tx: watch::Sender<EngineStatus>,
        registry: Registry,
    ) -> Self {
        Self {
            host,
            candidates,
            init_timeout,
            lifecycle: Lifecycle::Uninitialized,
            process: None,
            waiters: Vec::new(),
            next_generation: 0,
            status_tx,
            registry,
        }
    }

    fn init_deadline(&self) -> Option<Instant> {
        match self.lifecycle {
            Lifecycle::Starting { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    async fn next_output(&mut self) -> ProcessOutput {
        match self.process.as_mut() {
            Some(live) => live.output.recv().await.unwrap_or(ProcessOutput::Exited),
            None => std::future::pending().await,
        }
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        let status = match lifecycle {
            Lifecycle::Uninitialized => EngineStatus::Uninitialized,
            Lifecycle::Starting { index, .. } => EngineStatus::Starting { candidate: index },
            Lifecycle::Ready { index } => EngineStatus::Ready { candidate: index },
            Lifecycle::Failed => EngineStatus::Failed,
            Lifecycle::Unsupported => EngineStatus::Unsupported,
        };
        self.lifecycle = lifecycle;
        self.status_tx.send_replace(status);
    }

    fn link(&self) -> Option<EngineLink> {
        let live = self.process.as_ref()?;
        Some(EngineLink {
            generation: live.generation,
            candidate: live.index,
            label: self.candidates[live.index].label.clone(),
        })
    }

    fn resolve_waiters(&mut self, link: Option<EngineLink>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(link.clone());
        }
    }

    fn handle_command(&mut self, cmd: SupervisorCommand) {
        match cmd {
            SupervisorCommand::Acquire { reply } => self.acquire(reply),
            SupervisorCommand::Send { generation, lines } => self.send(generation, lines),
            SupervisorCommand::HardReset { reply } => {
                if matches!(self.lifecycle, Lifecycle::Unsupported) {
                    tracing::debug!("Hard reset ignored, engines are unsupported here");
                    let _ = reply.send(());
                    return;
                }
                tracing::info!("Hard reset requested");
                self.terminate();
                self.set_lifecycle(Lifecycle::Uninitialized);
                if !self.waiters.is_empty() {
                    self.start_from(0);
                }
                let _ = reply.send(());
            }
            SupervisorCommand::Shutdown => self.shutdown(),
        }
    }

    fn acquire(&mut self, reply: oneshot::Sender<Option<EngineLink>>) {
        match self.lifecycle {
            Lifecycle::Ready { .. } => {
                let _ = reply.send(self.link());
            }
            Lifecycle::Starting { .. } => self.waiters.push(reply),
            Lifecycle::Unsupported => {
                let _ = reply.send(None);
            }
            Lifecycle::Failed => {
                tracing::info!("New demand after exhausted candidates, starting over");
                self.waiters.push(reply);
                self.start_from(0);
            }
            Lifecycle::Uninitialized => {
                self.waiters.push(reply);
                self.start_from(0);
            }
        }
    }

    fn send(&mut self, generation: u64, lines: Vec<String>) {
        let Some(live) = self.process.as_mut() else {
            tracing::debug!(generation, "Dropping commands, no engine running");
            return;
        };
        if live.generation != generation {
            tracing::debug!(
                generation,
                current = live.generation,
                "Dropping commands for a replaced engine"
            );
            return;
        }

        let failed = lines.iter().find_map(|line| live.process.send(line).err());
        if let Some(e) = failed {
            self.handle_failure(&format!("write failed: {}", e));
        }
    }

    /// Walk candidates from `first` until one launches. Construction failures
    /// advance immediately; running out of candidates ends in `Failed`.
    fn start_from(&mut self, first: usize) {
        let mut failures: Vec<String> = Vec::new();

        for index in first..self.candidates.len() {
            let candidate = self.candidates[index].clone();
            tracing::info!(index, candidate = %candidate, "Starting engine candidate");

            match self.host.spawn(&candidate) {
                Ok(spawned) => match self.launch(index, &candidate, spawned) {
                    Ok(()) => return,
                    Err(reason) => failures.push(format!("{}: {}", candidate, reason)),
                },
                Err(SpawnError::Unsupported(reason)) => {
                    tracing::error!("Engine processes unsupported: {}", reason);
                    self.set_lifecycle(Lifecycle::Unsupported);
                    self.resolve_waiters(None);
                    return;
                }
                Err(e) => {
                    tracing::warn!(index, "Engine candidate failed to construct: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        tracing::error!(?failures, "All engine candidates exhausted");
        self.set_lifecycle(Lifecycle::Failed);
        self.resolve_waiters(None);
    }

    fn launch(
        &mut self,
        index: usize,
        candidate: &EngineCandidate,
        spawned: SpawnedProcess,
    ) -> Result<(), String> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let (lines, _) = broadcast::channel(LINE_BUFFER);

        self.registry.send_replace(Some(LineChannel {
            generation,
            tx: lines.clone(),
        }));
        self.process = Some(LiveProcess {
            generation,
            index,
            process: spawned.process,
            output: spawned.output,
            lines,
        });

        let mut handshake = vec![UciCommand::Uci];
        if let Some(threads) = candidate.threads {
            handshake.push(UciCommand::threads(threads));
        }
        handshake.push(UciCommand::IsReady);

        let failed = self.process.as_mut().and_then(|live| {
            handshake
                .iter()
                .find_map(|cmd| live.process.send(&cmd.to_string()).err())
        });
        if let Some(e) = failed {
            self.terminate();
            return Err(e.to_string());
        }

        tracing::debug!(generation, "Handshake sent, waiting for acknowledgement");
        self.set_lifecycle(Lifecycle::Starting {
            index,
            deadline: Instant::now() + self.init_timeout,
        });
        Ok(())
    }

    fn handle_output(&mut self, output: ProcessOutput) {
        match output {
            ProcessOutput::Line(text) => {
                let Some(live) = self.process.as_ref() else {
                    return;
                };
                // No listeners is fine.
                let _ = live.lines.send(EngineLine {
                    generation: live.generation,
                    text: Arc::from(text.as_str()),
                });

                if let Lifecycle::Starting { index, .. } = self.lifecycle {
                    let acknowledged = parse_uci_message(&text)
                        .map(|msg| msg.is_handshake_ack())
                        .unwrap_or(false);
                    if acknowledged {
                        tracing::info!(index, "Engine ready");
                        self.set_lifecycle(Lifecycle::Ready { index });
                        let link = self.link();
                        self.resolve_waiters(link);
                    }
                }
            }
            ProcessOutput::Error(reason) => self.handle_failure(&reason),
            ProcessOutput::Exited => self.handle_failure("process exited"),
        }
    }

    fn handle_init_timeout(&mut self) {
        if let Lifecycle::Starting { index, .. } = self.lifecycle {
            tracing::warn!(
                index,
                timeout_ms = self.init_timeout.as_millis() as u64,
                "Engine did not acknowledge handshake in time"
            );
            self.terminate();
            self.start_from(index + 1);
        }
    }

    /// Runtime failure of the active process: move on to the next candidate.
    fn handle_failure(&mut self, reason: &str) {
        let index = match self.lifecycle {
            Lifecycle::Starting { index, .. } | Lifecycle::Ready { index } => index,
            _ => {
                self.terminate();
                return;
            }
        };
        tracing::warn!(index, "Engine failed: {}", reason);
        self.terminate();
        self.start_from(index + 1);
    }

    fn terminate(&mut self) {
        if let Some(mut live) = self.process.take() {
            tracing::debug!(generation = live.generation, "Terminating engine process");
            live.process.terminate();
            self.registry.send_replace(None);
        }
    }

    fn shutdown(&mut self) {
        self.terminate();
        self.resolve_waiters(None);
    }
}

/// The supervisor actor loop.
/// Owns all lifecycle state. Processes commands, engine output and the
/// handshake timer sequentially.
pub(crate) async fn run_supervisor(
    state: SupervisorState,
    cmd_rx: mpsc::Receiver<SupervisorCommand>,
) {
    run_supervisor_inner(state, cmd_rx)
        .instrument(tracing::info_span!("engine_supervisor"))
        .await;
}

async fn run_supervisor_inner(
    mut state: SupervisorState,
    mut cmd_rx: mpsc::Receiver<SupervisorCommand>,
) {
    tracing::info!(candidates = state.candidates.len(), "Engine supervisor started");

    loop {
        let deadline = state.init_deadline();

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SupervisorCommand::Shutdown) | None => {
                        tracing::info!("Engine supervisor shutting down");
                        state.shutdown();
                        break;
                    }
                    Some(cmd) => state.handle_command(cmd),
                }
            }

            output = state.next_output() => {
                state.handle_output(output);
            }

            _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                state.handle_init_timeout();
            }
        }
    }

    tracing::info!("Engine supervisor exited");
}
