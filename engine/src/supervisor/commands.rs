use tokio::sync::oneshot;

use super::EngineLink;

/// Messages from supervisor handles to the supervisor actor.
pub(crate) enum SupervisorCommand {
    Acquire {
        reply: oneshot::Sender<Option<EngineLink>>,
    },
    /// A batch written back to back, never interleaved with another batch.
    Send {
        generation: u64,
        lines: Vec<String>,
    },
    HardReset {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}
