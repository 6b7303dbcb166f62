use thiserror::Error;

/// An inline action (button) attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyAction {
    /// The label shown to the user.
    pub label: String,
    /// Opaque callback payload returned by the transport when the action is triggered.
    pub data: String,
}

impl NotifyAction {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self { label: label.into(), data: data.into() }
    }
}

/// A handle to a delivered notification, usable for later edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// The abstract chat transport.
///
/// The engine delivers deal-state and thread notifications through this boundary and nothing
/// else; it never blocks a state transition on delivery. Failures are tallied and logged by the
/// caller, not propagated.
#[allow(async_fn_in_trait)]
pub trait NotificationSink {
    async fn send(&self, user_id: i64, text: &str, actions: &[NotifyAction]) -> Result<MessageRef, NotifyError>;

    async fn edit(&self, message: &MessageRef, text: &str, actions: &[NotifyAction]) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// External text-hosting service for chat transcripts. Best-effort: on failure the caller falls
/// back to an inline transcript.
#[allow(async_fn_in_trait)]
pub trait TranscriptArchive {
    /// Uploads the rendered transcript and returns its public URL.
    async fn upload(&self, text: &str, title: &str) -> Result<String, ArchiveError>;
}

#[derive(Debug, Clone, Error)]
#[error("Transcript upload failed: {0}")]
pub struct ArchiveError(pub String);
