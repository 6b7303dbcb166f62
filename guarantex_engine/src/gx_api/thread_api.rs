use log::*;

use crate::{
    config::EngineConfig,
    db_types::{Deal, DealMessage, NewMessage, SYSTEM_SENDER},
    gx_api::deal_objects::{DealRole, ExportOutcome, Transcript, TranscriptParticipant},
    traits::{
        ChatSummary,
        DealLedgerDatabase,
        MessageHit,
        ThreadApiError,
        ThreadManagement,
        TranscriptArchive,
        UserManagement,
    },
};

/// Longest inline transcript we hand back when the archive is unavailable. Chat transports cap
/// message sizes around 4k; leave room for the framing around it.
const INLINE_TRANSCRIPT_LIMIT: usize = 3500;

/// How many messages a transcript export pulls. Reads for display use the much smaller
/// [`ThreadApi::recent_messages`] default.
const EXPORT_MESSAGE_LIMIT: i64 = 1000;

const DISPLAY_MESSAGE_LIMIT: i64 = 50;

/// The deal thread: an append-only message log scoped to a deal, gated by deal status, with
/// read tracking and transcript export.
pub struct ThreadApi<B> {
    db: B,
    config: EngineConfig,
}

impl<B> ThreadApi<B>
where B: ThreadManagement + DealLedgerDatabase + UserManagement
{
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Appends a user message to the deal thread.
    ///
    /// The sender must be one of the deal's participants, the deal must not have ended (chat is
    /// read-only once a deal is terminal; only the ledger's own closure message bypasses that,
    /// inside the closing transaction), and the text must be non-empty and within the length
    /// cap. Sender id 0 is reserved for the system.
    pub async fn post_message(&self, deal_id: i64, sender_id: i64, text: &str) -> Result<DealMessage, ThreadApiError> {
        if sender_id == SYSTEM_SENDER {
            return Err(ThreadApiError::ReservedSender);
        }
        let deal = self.deal_for_member(deal_id, sender_id).await?;
        if deal.status.is_terminal() {
            return Err(ThreadApiError::ThreadClosed(deal.status));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ThreadApiError::EmptyMessage);
        }
        if text.len() > self.config.max_message_len {
            return Err(ThreadApiError::MessageTooLong { len: text.len(), max: self.config.max_message_len });
        }
        let message = self.db.insert_message(NewMessage::from_user(deal_id, sender_id, text)).await?;
        trace!("💬️ Message {} posted to deal #{deal_id} by {sender_id}", message.id);
        Ok(message)
    }

    /// The thread's most recent messages, oldest first.
    pub async fn recent_messages(&self, deal_id: i64, reader_id: i64) -> Result<Vec<DealMessage>, ThreadApiError> {
        self.deal_for_reader(deal_id, reader_id).await?;
        self.db.messages_for_deal(deal_id, DISPLAY_MESSAGE_LIMIT).await
    }

    /// Flags everything the reader has not written as read. Returns the number of messages
    /// flipped.
    pub async fn mark_read(&self, deal_id: i64, reader_id: i64) -> Result<u64, ThreadApiError> {
        self.deal_for_member(deal_id, reader_id).await?;
        self.db.mark_messages_read(deal_id, reader_id).await
    }

    /// Unread-message badge count for the reader.
    pub async fn unread_count(&self, deal_id: i64, reader_id: i64) -> Result<i64, ThreadApiError> {
        self.deal_for_reader(deal_id, reader_id).await?;
        self.db.unread_count(deal_id, reader_id).await
    }

    /// Builds the structured transcript: deal metadata, participant roster with per-participant
    /// message counts, and the full message list. Participants may export their own deals;
    /// the administrator may export any.
    pub async fn transcript(&self, deal_id: i64, requester_id: i64) -> Result<Transcript, ThreadApiError> {
        let deal = self.deal_for_reader(deal_id, requester_id).await?;
        let counts = self.db.message_counts_by_sender(deal_id).await?;
        let count_for = |id: i64| counts.iter().find(|(sender, _)| *sender == id).map(|(_, n)| *n).unwrap_or(0);
        let mut participants = Vec::with_capacity(3);
        for (role, user_id) in [
            (DealRole::Seller, Some(deal.seller_id)),
            (DealRole::Buyer, deal.buyer_id),
            (DealRole::Guarantor, deal.guarantor_id),
        ] {
            let Some(user_id) = user_id else { continue };
            let name = self.db.fetch_user(user_id).await?.map(|u| u.display_name());
            participants.push(TranscriptParticipant { role, user_id, name, message_count: count_for(user_id) });
        }
        let messages = self.db.messages_for_deal(deal_id, EXPORT_MESSAGE_LIMIT).await?;
        Ok(Transcript { deal, participants, messages })
    }

    /// Exports the transcript to the archive sink, falling back to a truncated inline rendering
    /// when the upload fails. The fallback is the degraded result, never an error.
    pub async fn export<A: TranscriptArchive>(
        &self,
        deal_id: i64,
        requester_id: i64,
        archive: &A,
    ) -> Result<ExportOutcome, ThreadApiError> {
        let transcript = self.transcript(deal_id, requester_id).await?;
        let text = transcript.render_text();
        let title = format!("Deal {} thread", transcript.deal.deal_code);
        match archive.upload(&text, &title).await {
            Ok(url) => {
                info!("💬️ Transcript of deal #{deal_id} archived at {url}");
                Ok(ExportOutcome::Linked(url))
            },
            Err(e) => {
                warn!("💬️ Transcript archive unavailable for deal #{deal_id}: {e}. Falling back to inline text.");
                let mut inline = text;
                if inline.len() > INLINE_TRANSCRIPT_LIMIT {
                    let mut cut = INLINE_TRANSCRIPT_LIMIT;
                    while !inline.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    inline.truncate(cut);
                    inline.push_str("\n… (truncated)");
                }
                Ok(ExportOutcome::Inline(inline))
            },
        }
    }

    /// Admin view: chats ordered by most recent activity.
    pub async fn chat_summaries(&self, requester_id: i64, limit: i64) -> Result<Vec<ChatSummary>, ThreadApiError> {
        if !self.config.is_admin(requester_id) {
            return Err(ThreadApiError::AdminOnly);
        }
        self.db.chat_summaries(limit).await
    }

    /// Admin view: substring search across every thread.
    pub async fn search_messages(
        &self,
        requester_id: i64,
        term: &str,
        limit: i64,
    ) -> Result<Vec<MessageHit>, ThreadApiError> {
        if !self.config.is_admin(requester_id) {
            return Err(ThreadApiError::AdminOnly);
        }
        self.db.search_messages(term, limit).await
    }

    /// Write-path access check: participants only.
    async fn deal_for_member(&self, deal_id: i64, user_id: i64) -> Result<Deal, ThreadApiError> {
        let deal = self.db.fetch_deal_by_id(deal_id).await?.ok_or(ThreadApiError::DealNotFound(deal_id))?;
        if !deal.is_participant(user_id) {
            return Err(ThreadApiError::NotAParticipant { user_id, deal_id });
        }
        Ok(deal)
    }

    /// Read-path access check: participants, or the administrator for inspection.
    async fn deal_for_reader(&self, deal_id: i64, user_id: i64) -> Result<Deal, ThreadApiError> {
        let deal = self.db.fetch_deal_by_id(deal_id).await?.ok_or(ThreadApiError::DealNotFound(deal_id))?;
        if !deal.is_participant(user_id) && !self.config.is_admin(user_id) {
            return Err(ThreadApiError::NotAParticipant { user_id, deal_id });
        }
        Ok(deal)
    }
}
