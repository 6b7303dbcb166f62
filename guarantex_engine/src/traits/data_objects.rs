use chrono::{DateTime, Utc};
use gtx_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::{Deal, DealCode, DealStatus};

/// Per-recipient tally of a guarantor dispatch round. Delivery is best-effort; the tally lets
/// the caller log aggregate failure without per-send boilerplate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Guarantors the summons reached.
    pub notified: usize,
    /// Guarantors skipped because they are mediating another deal.
    pub skipped_busy: usize,
    /// Guarantors whose notification failed to send.
    pub failed: usize,
}

impl DispatchReport {
    pub fn reached_anyone(&self) -> bool {
        self.notified > 0
    }
}

/// A deal joined with its participants' display names, for history and admin views.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DealHistoryEntry {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub deal: Deal,
    pub seller_name: Option<String>,
    pub buyer_name: Option<String>,
    pub guarantor_name: Option<String>,
}

/// Marketplace-wide rollup for the admin surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceStats {
    pub total_users: i64,
    pub banned_users: i64,
    pub guarantors: i64,
    pub total_deals: i64,
    pub active_deals: i64,
    pub completed_deals: i64,
    pub cancelled_deals: i64,
    /// Sum of completed deal amounts, in minor units across currencies.
    pub completed_volume: Money,
}

/// One row of the admin chat overview.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatSummary {
    pub deal_id: i64,
    pub deal_code: DealCode,
    pub status: DealStatus,
    pub message_count: i64,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// A message search hit with enough deal context to act on it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MessageHit {
    pub message_id: i64,
    pub deal_id: i64,
    pub deal_code: DealCode,
    pub deal_status: DealStatus,
    pub sender_id: i64,
    pub message_text: String,
    pub created_at: DateTime<Utc>,
}
