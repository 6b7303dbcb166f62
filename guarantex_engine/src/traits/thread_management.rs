use thiserror::Error;

use crate::{
    db_types::{DealMessage, DealStatus, NewMessage},
    traits::{ChatSummary, MessageHit},
};

/// Storage for deal threads: append-only message logs with read tracking.
///
/// These are raw storage operations. The status/participant write gate lives in the thread API;
/// the ledger's own closure messages are inserted inside the completion/cancellation
/// transactions and never pass through here.
#[allow(async_fn_in_trait)]
pub trait ThreadManagement {
    async fn insert_message(&self, message: NewMessage) -> Result<DealMessage, ThreadApiError>;

    /// Messages in insertion order, capped at `limit`.
    async fn messages_for_deal(&self, deal_id: i64, limit: i64) -> Result<Vec<DealMessage>, ThreadApiError>;

    /// Count of messages authored by someone other than `reader_id` and not yet read.
    async fn unread_count(&self, deal_id: i64, reader_id: i64) -> Result<i64, ThreadApiError>;

    /// Flags every message not authored by `reader_id` as read. Returns the number flipped.
    async fn mark_messages_read(&self, deal_id: i64, reader_id: i64) -> Result<u64, ThreadApiError>;

    /// `(sender_id, message_count)` pairs for the deal's user messages.
    async fn message_counts_by_sender(&self, deal_id: i64) -> Result<Vec<(i64, i64)>, ThreadApiError>;

    /// Per-deal chat overviews for the admin surface, most recently active first.
    async fn chat_summaries(&self, limit: i64) -> Result<Vec<ChatSummary>, ThreadApiError>;

    /// Substring search across all threads, newest first.
    async fn search_messages(&self, term: &str, limit: i64) -> Result<Vec<MessageHit>, ThreadApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum ThreadApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No deal with id {0} exists")]
    DealNotFound(i64),
    #[error("User {user_id} takes no part in deal #{deal_id}")]
    NotAParticipant { user_id: i64, deal_id: i64 },
    #[error("The thread is closed; the deal has ended ({0})")]
    ThreadClosed(DealStatus),
    #[error("Messages cannot be empty")]
    EmptyMessage,
    #[error("Message is too long ({len} > {max} characters)")]
    MessageTooLong { len: usize, max: usize },
    #[error("Sender id 0 is reserved for system messages")]
    ReservedSender,
    #[error("Administrator access required")]
    AdminOnly,
}

impl From<sqlx::Error> for ThreadApiError {
    fn from(e: sqlx::Error) -> Self {
        ThreadApiError::DatabaseError(e.to_string())
    }
}

// Thread access checks read the deal through the ledger; its storage failures are plain
// database errors here.
impl From<crate::traits::DealLedgerError> for ThreadApiError {
    fn from(e: crate::traits::DealLedgerError) -> Self {
        ThreadApiError::DatabaseError(e.to_string())
    }
}

impl From<crate::traits::AccountApiError> for ThreadApiError {
    fn from(e: crate::traits::AccountApiError) -> Self {
        ThreadApiError::DatabaseError(e.to_string())
    }
}
