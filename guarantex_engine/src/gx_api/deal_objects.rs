use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Deal, DealMessage, MessageKind, SYSTEM_SENDER},
    helpers::format_amount,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealRole {
    Seller,
    Buyer,
    Guarantor,
}

impl Display for DealRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DealRole::Seller => write!(f, "seller"),
            DealRole::Buyer => write!(f, "buyer"),
            DealRole::Guarantor => write!(f, "guarantor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptParticipant {
    pub role: DealRole,
    pub user_id: i64,
    pub name: Option<String>,
    /// User (non-system) messages this participant wrote in the thread.
    pub message_count: i64,
}

/// The structured transcript of a deal thread: deal metadata, the participant roster with
/// per-participant message counts, and the full ordered message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub deal: Deal,
    pub participants: Vec<TranscriptParticipant>,
    pub messages: Vec<DealMessage>,
}

impl Transcript {
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.kind == MessageKind::User).count()
    }

    pub fn system_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.kind == MessageKind::System).count()
    }

    fn sender_label(&self, message: &DealMessage) -> String {
        if message.sender_id == SYSTEM_SENDER || message.kind == MessageKind::System {
            return "🤖 SYSTEM".to_string();
        }
        match self.participants.iter().find(|p| p.user_id == message.sender_id) {
            Some(p) => {
                let name = p.name.clone().unwrap_or_else(|| format!("ID{}", p.user_id));
                format!("{name} [{}]", p.role.to_string().to_uppercase())
            },
            None => format!("ID{} [UNKNOWN]", message.sender_id),
        }
    }

    /// The machine-readable form of the transcript, for archives that take structured payloads.
    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Renders the transcript as plain text for the archive sink (or the inline fallback).
    pub fn render_text(&self) -> String {
        let deal = &self.deal;
        let mut out = String::new();
        out.push_str(&format!("=== DEAL #{} THREAD ===\n\n", deal.id));
        out.push_str("DEAL\n");
        out.push_str(&format!("    code:        {}\n", deal.deal_code));
        out.push_str(&format!("    amount:      {}\n", format_amount(deal.amount, deal.currency)));
        out.push_str(&format!("    status:      {}\n", deal.status));
        out.push_str(&format!("    created:     {}\n", deal.created_at));
        match deal.completed_at {
            Some(ts) => out.push_str(&format!("    ended:       {ts}\n")),
            None => out.push_str("    ended:       -\n"),
        }
        out.push_str(&format!("    description: {}\n\n", deal.description));
        out.push_str("PARTICIPANTS\n");
        for p in &self.participants {
            let name = p.name.clone().unwrap_or_else(|| format!("ID{}", p.user_id));
            out.push_str(&format!("    {}: {name} (ID: {}) — {} message(s)\n", p.role, p.user_id, p.message_count));
        }
        out.push_str(&format!(
            "\nMESSAGES — {} total, {} user, {} system\n{}\n",
            self.messages.len(),
            self.user_message_count(),
            self.system_message_count(),
            "=".repeat(60)
        ));
        if self.messages.is_empty() {
            out.push_str("(no messages)\n");
        }
        for (i, message) in self.messages.iter().enumerate() {
            out.push_str(&format!("[{:03}] {}\n", i + 1, message.created_at));
            out.push_str(&format!("      {}\n", self.sender_label(message)));
            out.push_str(&format!("      {}\n\n", message.message_text));
        }
        out
    }
}

/// The outcome of a transcript export. Upload failures degrade to the inline rendering instead
/// of surfacing an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Uploaded to the archive; the transcript lives at this URL.
    Linked(String),
    /// The archive was unavailable; here is the (possibly truncated) transcript itself.
    Inline(String),
}
