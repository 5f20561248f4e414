//! Per-item progress events

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use super::actions::PushOutcome;

/// Progress of a single artifact within a push or pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Artifact saved locally
    Pulled {
        /// Display name
        name: String,
    },
    /// Artifact saved locally, with a warning
    PulledWarning {
        /// Display name
        name: String,
        /// What was suspicious
        message: String,
    },
    /// Artifact could not be pulled
    PulledError {
        /// Display name
        name: String,
        /// Error message
        error: String,
    },
    /// Artifact pushed
    Pushed {
        /// Display name
        name: String,
        /// How the push ended
        outcome: PushOutcome,
    },
    /// Artifact could not be pushed
    PushedError {
        /// Display name
        name: String,
        /// Error message
        error: String,
    },
}

impl SyncEvent {
    /// Whether the event reports a failure
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::PulledError { .. } | Self::PushedError { .. })
    }

    /// Display name of the artifact
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Pulled { name }
            | Self::PulledWarning { name, .. }
            | Self::PulledError { name, .. }
            | Self::Pushed { name, .. }
            | Self::PushedError { name, .. } => name,
        }
    }
}

/// Sending half of a per-call event channel
///
/// Emitting never blocks and never fails; events sent after the receiver
/// is dropped are discarded.
#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    sender: Option<UnboundedSender<SyncEvent>>,
}

impl EventEmitter {
    /// Create an emitter and the receiver its events arrive on
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<SyncEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Emitter that discards everything
    #[must_use]
    pub const fn silent() -> Self {
        Self { sender: None }
    }

    /// Send an event
    pub fn emit(&self, event: SyncEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
