//! Engine processes as native child processes speaking UCI over stdio.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::candidates::EngineCandidate;
use crate::host::{EngineHost, EngineProcess, ProcessError, ProcessOutput, SpawnError, SpawnedProcess};
use crate::uci::UciCommand;

/// Buffered output lines per process before the reader waits on the supervisor.
const OUTPUT_BUFFER: usize = 256;

/// Spawns candidates as child processes on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessHost;

impl EngineHost for ProcessHost {
    #[tracing::instrument(level = "info", skip(self, candidate), fields(candidate = %candidate.label))]
    fn spawn(&self, candidate: &EngineCandidate) -> Result<SpawnedProcess, SpawnError> {
        let runtime = Handle::try_current().map_err(|e| {
            tracing::error!("No tokio runtime to host engine processes: {}", e);
            SpawnError::Unsupported(e.to_string())
        })?;

        tracing::debug!("Spawning engine process {:?}", candidate.program);
        let mut child = {
            let _guard = runtime.enter();
            tokio::process::Command::new(&candidate.program)
                .args(&candidate.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    tracing::warn!("Failed to spawn engine: {}", e);
                    SpawnError::Launch {
                        label: candidate.label.clone(),
                        reason: e.to_string(),
                    }
                })?
        };

        let stdin = child.stdin.take().ok_or_else(|| SpawnError::Launch {
            label: candidate.label.clone(),
            reason: "engine has no stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| SpawnError::Launch {
            label: candidate.label.clone(),
            reason: "engine has no stdout".to_string(),
        })?;

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();

        runtime.spawn(read_output(stdout, output_tx.clone(), candidate.label.clone()));
        runtime.spawn(write_input(stdin, stdin_rx, output_tx, candidate.label.clone()));

        tracing::info!(pid = ?child.id(), "Engine process spawned");
        Ok(SpawnedProcess {
            process: Box::new(ChildProcess {
                child,
                stdin: stdin_tx,
                label: candidate.label.clone(),
                terminated: false,
            }),
            output: output_rx,
        })
    }
}

struct ChildProcess {
    child: Child,
    stdin: mpsc::UnboundedSender<String>,
    label: String,
    terminated: bool,
}

impl EngineProcess for ChildProcess {
    fn send(&mut self, line: &str) -> Result<(), ProcessError> {
        if self.terminated {
            return Err(ProcessError::Closed);
        }
        self.stdin
            .send(format!("{}\n", line))
            .map_err(|_| ProcessError::Closed)
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        tracing::info!(candidate = %self.label, "Terminating engine process");
        let _ = self.stdin.send(format!("{}\n", UciCommand::Quit));
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(candidate = %self.label, "Engine already gone: {}", e);
        }
    }
}

async fn read_output(stdout: ChildStdout, output_tx: mpsc::Sender<ProcessOutput>, label: String) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        // Engines may print arbitrary bytes in `info string`; never fail on them.
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                tracing::warn!(candidate = %label, "Engine stdout EOF - engine closed");
                let _ = output_tx.send(ProcessOutput::Exited).await;
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                tracing::trace!("UCI << {}", trimmed);
                if output_tx
                    .send(ProcessOutput::Line(trimmed.to_string()))
                    .await
                    .is_err()
                {
                    // Supervisor dropped this process.
                    break;
                }
            }
            Err(e) => {
                tracing::error!(candidate = %label, "Error reading from engine stdout: {}", e);
                let _ = output_tx.send(ProcessOutput::Error(e.to_string())).await;
                break;
            }
        }
    }
    tracing::debug!(candidate = %label, "Output reader task exiting");
}

async fn write_input(
    mut stdin: ChildStdin,
    mut stdin_rx: mpsc::UnboundedReceiver<String>,
    output_tx: mpsc::Sender<ProcessOutput>,
    label: String,
) {
    while let Some(cmd) = stdin_rx.recv().await {
        tracing::trace!("UCI >> {}", cmd.trim());

        let result = match stdin.write_all(cmd.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            if cmd.trim() == UciCommand::Quit.to_string() {
                break;
            }
            tracing::error!(candidate = %label, "Failed to write to engine stdin: {}", e);
            let _ = output_tx.send(ProcessOutput::Error(e.to_string())).await;
            break;
        }
    }
    tracing::debug!(candidate = %label, "Stdin writer task exiting");
}
