//! Listener registry: every live [`Listener`] sees every line the current
//! engine process prints.
//!
//! Each process instance gets its own broadcast channel. The current channel
//! is published through a watch channel, so a listener re-subscribes when the
//! process is replaced and never reads a stale instance's lines after that.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

/// One raw output line, tagged with the process generation that printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLine {
    pub generation: u64,
    pub text: Arc<str>,
}

/// The broadcast channel of one process instance.
#[derive(Debug, Clone)]
pub(crate) struct LineChannel {
    pub(crate) generation: u64,
    pub(crate) tx: broadcast::Sender<EngineLine>,
}

pub(crate) type Registry = Arc<watch::Sender<Option<LineChannel>>>;

/// Subscription to the shared engine's output. Survives engine restarts;
/// dropping it unsubscribes.
pub struct Listener {
    instances: watch::Receiver<Option<LineChannel>>,
    current: Option<(u64, broadcast::Receiver<EngineLine>)>,
}

impl Listener {
    pub(crate) fn new(registry: &Registry) -> Self {
        let mut listener = Self {
            instances: registry.subscribe(),
            current: None,
        };
        listener.follow();
        listener
    }

    /// Switch to the currently published process instance, if it changed.
    pub(crate) fn follow(&mut self) {
        let published = self.instances.borrow_and_update().clone();
        match published {
            Some(channel) => {
                let current = self.current.as_ref().map(|(generation, _)| *generation);
                if current != Some(channel.generation) {
                    tracing::trace!(generation = channel.generation, "Listener following engine");
                    self.current = Some((channel.generation, channel.tx.subscribe()));
                }
            }
            None => self.current = None,
        }
    }

    /// Generation currently followed.
    pub fn generation(&self) -> Option<u64> {
        self.current.as_ref().map(|(generation, _)| *generation)
    }

    /// Next line from whichever process is current. Pending while there is none.
    pub async fn recv(&mut self) -> EngineLine {
        loop {
            self.follow();
            let Self { instances, current } = self;

            let Some((_, rx)) = current.as_mut() else {
                if instances.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
                continue;
            };

            tokio::select! {
                line = rx.recv() => match line {
                    Ok(line) => return line,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Listener lagged behind engine output");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        *current = None;
                        if instances.changed().await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    }
                },
                changed = instances.changed() => {
                    if changed.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }
}
