use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{Currency, Deal, DealCode, DealStatus, NewDeal},
    traits::{AccountApiError, DealHistoryEntry, MarketplaceStats},
};

/// Storage operations for the deal ledger.
///
/// The race-sensitive operations (`join_deal`, `assign_guarantor`, `complete_deal`,
/// `cancel_deal`) return `Ok(None)` when their conditional update matched zero rows: the caller
/// lost a race or the deal is no longer in the required state. That outcome is expected traffic,
/// not an error, and callers translate it into a "no longer available" message.
#[allow(async_fn_in_trait)]
pub trait DealLedgerDatabase: Clone {
    /// The URL of the backing store.
    fn url(&self) -> &str;

    /// Reserves the code and inserts the deal in one transaction. The code reservation outlives
    /// the deal, so codes are never reused. Fails with [`DealLedgerError::CodeAlreadyIssued`] if
    /// the code has ever been handed out before; callers regenerate and retry.
    async fn insert_deal(&self, deal: NewDeal, code: DealCode) -> Result<Deal, DealLedgerError>;

    async fn fetch_deal_by_code(&self, code: &DealCode) -> Result<Option<Deal>, DealLedgerError>;

    async fn fetch_deal_by_id(&self, deal_id: i64) -> Result<Option<Deal>, DealLedgerError>;

    /// Attaches `buyer_id` to the deal, conditioned on the deal still being `waiting_buyer` with
    /// no buyer. Exactly one of N concurrent joiners succeeds; the rest see `Ok(None)`.
    /// Appends the "buyer joined" system message on success.
    async fn join_deal(&self, code: &DealCode, buyer_id: i64) -> Result<Option<Deal>, DealLedgerError>;

    /// Sets the one-shot guarantor-called latch. Returns `false` if it was already set.
    async fn set_guarantor_called(&self, deal_id: i64) -> Result<bool, DealLedgerError>;

    /// Clears the latch so the parties may summon guarantors again (used when a dispatch round
    /// reached nobody).
    async fn reset_guarantor_called(&self, deal_id: i64) -> Result<(), DealLedgerError>;

    /// Assigns `guarantor_id` and moves the deal to `in_progress`, stamping `started_at`,
    /// conditioned on the deal still being `waiting_guarantor` with no guarantor. Of N racing
    /// acceptors exactly one succeeds. A guarantor who already mediates an `in_progress` deal is
    /// rejected with [`DealLedgerError::GuarantorBusy`], enforced by a partial unique index at
    /// write time. Appends the "guarantor accepted" system message on success.
    async fn assign_guarantor(&self, deal_id: i64, guarantor_id: i64) -> Result<Option<Deal>, DealLedgerError>;

    /// Moves an `in_progress` deal to `completed`: stamps `completed_at`, appends the closure
    /// system message, and increments both participants' deal counters, all in one transaction.
    /// `Ok(None)` when the deal was not `in_progress` (e.g. the second of two racing completers).
    async fn complete_deal(&self, deal_id: i64, closure_note: &str) -> Result<Option<Deal>, DealLedgerError>;

    /// Moves any non-terminal deal to `cancelled`, clears the guarantor-called latch, stamps
    /// `completed_at` and appends the closure system message. `Ok(None)` when already terminal.
    async fn cancel_deal(&self, deal_id: i64, closure_note: &str) -> Result<Option<Deal>, DealLedgerError>;

    /// The non-terminal deal in which the user is seller or buyer, if any. The ledger maintains
    /// at most one.
    async fn active_deal_for_participant(&self, user_id: i64) -> Result<Option<Deal>, DealLedgerError>;

    /// The `in_progress` deal the guarantor is mediating, if any.
    async fn active_deal_for_guarantor(&self, guarantor_id: i64) -> Result<Option<Deal>, DealLedgerError>;

    async fn deals_awaiting_guarantor(&self) -> Result<Vec<Deal>, DealLedgerError>;

    /// Every deal the user took part in, in any role, newest first, with participant display
    /// names joined in.
    async fn deal_history_for_user(&self, user_id: i64) -> Result<Vec<DealHistoryEntry>, DealLedgerError>;

    /// Hard-deletes `waiting_buyer` deals older than `older_than` (and their messages). Their
    /// code reservations remain. Returns the number of deals purged. Idempotent; safe to run
    /// concurrently with normal traffic.
    async fn purge_stale_deals(&self, older_than: Duration) -> Result<u64, DealLedgerError>;

    async fn marketplace_stats(&self) -> Result<MarketplaceStats, DealLedgerError>;

    /// Closes the store.
    async fn close(&mut self) -> Result<(), DealLedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum DealLedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("No deal with code {0} exists")]
    DealNotFound(DealCode),
    #[error("No deal with id {0} exists")]
    DealIdNotFound(i64),
    #[error("Deal code {0} has already been issued")]
    CodeAlreadyIssued(DealCode),
    #[error("User {0} already takes part in an open deal")]
    ActiveDealExists(i64),
    #[error("A seller cannot join their own deal")]
    CannotJoinOwnDeal,
    #[error("The deal is no longer available")]
    DealUnavailable,
    #[error("The deal has already ended ({0})")]
    AlreadyTerminal(DealStatus),
    #[error("A guarantor has already been called for this deal")]
    GuarantorAlreadyCalled,
    #[error("User {0} is not a guarantor")]
    NotAGuarantor(i64),
    #[error("Guarantor {0} is already mediating another deal")]
    GuarantorBusy(i64),
    #[error("User {user_id} takes no part in deal #{deal_id}")]
    NotAParticipant { user_id: i64, deal_id: i64 },
    #[error("User {user_id} may not {action} this deal")]
    NotAuthorized { user_id: i64, action: &'static str },
    #[error("User {0} is banned")]
    UserBanned(i64),
    #[error("User {0} is on the scammer list")]
    UserFlagged(i64),
    #[error("No active wallet accepts {0} payouts")]
    NoCompatibleWallet(Currency),
    #[error("Invalid deal amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid deal description: {0}")]
    InvalidDescription(String),
    #[error("The deal is not in progress ({0})")]
    NotInProgress(DealStatus),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
}

impl From<sqlx::Error> for DealLedgerError {
    fn from(e: sqlx::Error) -> Self {
        DealLedgerError::DatabaseError(e.to_string())
    }
}

// Ledger transactions embed thread writes (system messages); any storage failure there is a
// plain database error from the ledger's point of view.
impl From<crate::traits::ThreadApiError> for DealLedgerError {
    fn from(e: crate::traits::ThreadApiError) -> Self {
        DealLedgerError::DatabaseError(e.to_string())
    }
}

impl From<crate::traits::WalletApiError> for DealLedgerError {
    fn from(e: crate::traits::WalletApiError) -> Self {
        DealLedgerError::DatabaseError(e.to_string())
    }
}
