use std::fmt::Debug;

use gtx_common::Money;
use log::*;

use crate::{
    config::EngineConfig,
    db_types::{Currency, Deal, DealCode, DealStatus, NewDeal, User},
    events::{BuyerJoinedEvent, DealCancelledEvent, DealCompletedEvent, EventProducers, GuarantorAssignedEvent},
    helpers::generate_deal_code,
    traits::{
        AccountApiError,
        DealHistoryEntry,
        DealLedgerDatabase,
        DealLedgerError,
        MarketplaceStats,
        UserManagement,
        WalletManagement,
    },
};

/// How many code candidates to try before giving up on deal creation. At six alphanumeric
/// characters collisions are rare enough that hitting this bound means something is broken.
const MAX_CODE_ATTEMPTS: usize = 100;

/// `DealFlowApi` is the primary API for moving deals through their lifecycle:
/// `waiting_buyer → waiting_guarantor → in_progress → {completed | cancelled}`.
///
/// Every transition is arbitrated by a conditional write in the backend, so any number of
/// handler tasks (or processes) can call these methods concurrently; losers of a race get a
/// specific error, not a corrupted deal.
pub struct DealFlowApi<B> {
    db: B,
    config: EngineConfig,
    producers: EventProducers,
}

impl<B> Debug for DealFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DealFlowApi")
    }
}

impl<B> DealFlowApi<B> {
    pub fn new(db: B, config: EngineConfig, producers: EventProducers) -> Self {
        Self { db, config, producers }
    }
}

impl<B> DealFlowApi<B>
where B: DealLedgerDatabase + UserManagement + WalletManagement
{
    /// Opens a new deal for the seller.
    ///
    /// Fails when the seller is unknown, banned or scammer-flagged, already takes part in an
    /// open deal, has no active wallet compatible with the deal currency, or when the amount or
    /// description falls outside the configured bounds. A unique code is generated by retrying
    /// against the store's permanent code reservation; the new deal starts in `waiting_buyer`.
    pub async fn create_deal(
        &self,
        seller_id: i64,
        currency: Currency,
        amount: Money,
        description: &str,
    ) -> Result<Deal, DealLedgerError> {
        let seller = self.known_good_user(seller_id).await?;
        if let Some(deal) = self.db.active_deal_for_participant(seller_id).await? {
            debug!("🔄️ User {seller_id} tried to open a second deal while [{}] is open", deal.deal_code);
            return Err(DealLedgerError::ActiveDealExists(seller_id));
        }
        if !amount.is_positive() {
            return Err(DealLedgerError::InvalidAmount(format!("{amount} is not a positive amount")));
        }
        if amount > self.config.max_amount {
            return Err(DealLedgerError::InvalidAmount(format!(
                "{amount} exceeds the maximum of {}",
                self.config.max_amount
            )));
        }
        let description = description.trim();
        if description.len() < self.config.min_description_len {
            return Err(DealLedgerError::InvalidDescription(format!(
                "at least {} characters required",
                self.config.min_description_len
            )));
        }
        if description.len() > self.config.max_description_len {
            return Err(DealLedgerError::InvalidDescription(format!(
                "at most {} characters allowed",
                self.config.max_description_len
            )));
        }
        if self.db.compatible_wallet(seller_id, currency).await?.is_none() {
            return Err(DealLedgerError::NoCompatibleWallet(currency));
        }
        let new_deal = NewDeal::new(seller_id, currency, amount, description)
            .with_commission(self.config.commission_percent);
        for attempt in 0..MAX_CODE_ATTEMPTS {
            let code = generate_deal_code(self.config.code_length);
            match self.db.insert_deal(new_deal.clone(), code.clone()).await {
                Ok(deal) => {
                    debug!("🔄️ Deal [{}] created by seller {} ({})", deal.deal_code, seller.display_name(), seller_id);
                    return Ok(deal);
                },
                Err(DealLedgerError::CodeAlreadyIssued(code)) => {
                    debug!("🔄️ Deal code {code} already issued (attempt {attempt}); regenerating");
                },
                Err(e) => return Err(e),
            }
        }
        error!("🔄️ Could not allocate a unique deal code after {MAX_CODE_ATTEMPTS} attempts");
        Err(DealLedgerError::DatabaseError("deal code space exhausted".to_string()))
    }

    /// Attaches the buyer to the deal behind `code` and moves it to `waiting_guarantor`.
    ///
    /// Of two buyers racing with the same code, exactly one succeeds; the other gets
    /// [`DealLedgerError::DealUnavailable`], the same answer as for a deal that has already
    /// moved on.
    pub async fn join_deal(&self, code: &DealCode, buyer_id: i64) -> Result<Deal, DealLedgerError> {
        self.known_good_user(buyer_id).await?;
        if let Some(deal) = self.db.active_deal_for_participant(buyer_id).await? {
            debug!("🔄️ User {buyer_id} tried to join a deal while [{}] is open", deal.deal_code);
            return Err(DealLedgerError::ActiveDealExists(buyer_id));
        }
        let deal = self.db.fetch_deal_by_code(code).await?.ok_or_else(|| DealLedgerError::DealNotFound(code.clone()))?;
        if deal.seller_id == buyer_id {
            return Err(DealLedgerError::CannotJoinOwnDeal);
        }
        if !deal.status.can_transition_to(DealStatus::WaitingGuarantor) {
            return Err(match deal.status {
                s if s.is_terminal() => DealLedgerError::AlreadyTerminal(s),
                _ => DealLedgerError::DealUnavailable,
            });
        }
        // The fetch above was only for friendly errors; the join itself re-checks everything in
        // one conditional write.
        let deal = self.db.join_deal(code, buyer_id).await?.ok_or(DealLedgerError::DealUnavailable)?;
        self.call_buyer_joined_hook(&deal).await;
        Ok(deal)
    }

    /// Assigns the accepting guarantor and moves the deal to `in_progress`.
    ///
    /// Of N guarantors racing to accept, exactly one succeeds; the rest get
    /// [`DealLedgerError::DealUnavailable`] and their stale accept affordances should be
    /// answered with a polite "no longer available".
    pub async fn assign_guarantor(&self, deal_id: i64, guarantor_id: i64) -> Result<Deal, DealLedgerError> {
        let guarantor = self.known_good_user(guarantor_id).await?;
        if !guarantor.is_guarantor {
            return Err(DealLedgerError::NotAGuarantor(guarantor_id));
        }
        if let Some(busy) = self.db.active_deal_for_guarantor(guarantor_id).await? {
            debug!("🔄️ Guarantor {guarantor_id} tried to accept #{deal_id} while mediating [{}]", busy.deal_code);
            return Err(DealLedgerError::GuarantorBusy(guarantor_id));
        }
        let deal = self.db.assign_guarantor(deal_id, guarantor_id).await?.ok_or(DealLedgerError::DealUnavailable)?;
        self.call_guarantor_assigned_hook(&deal).await;
        Ok(deal)
    }

    /// Completes an `in_progress` deal. Only the assigned guarantor or the configured
    /// administrator may complete; terminal deals stay terminal, for administrators too.
    pub async fn complete_deal(&self, deal_id: i64, acting_user_id: i64) -> Result<Deal, DealLedgerError> {
        let deal =
            self.db.fetch_deal_by_id(deal_id).await?.ok_or(DealLedgerError::DealIdNotFound(deal_id))?;
        let is_guarantor = deal.guarantor_id == Some(acting_user_id);
        if !is_guarantor && !self.config.is_admin(acting_user_id) {
            return Err(DealLedgerError::NotAuthorized { user_id: acting_user_id, action: "complete" });
        }
        if !deal.status.can_transition_to(DealStatus::Completed) {
            return Err(match deal.status {
                s if s.is_terminal() => DealLedgerError::AlreadyTerminal(s),
                s => DealLedgerError::NotInProgress(s),
            });
        }
        let note = "🔒 Chat closed. The deal was completed successfully!";
        let deal = match self.db.complete_deal(deal_id, note).await? {
            Some(deal) => deal,
            // A second completer raced us here; report what the deal has become.
            None => {
                let status = self
                    .db
                    .fetch_deal_by_id(deal_id)
                    .await?
                    .map(|d| d.status)
                    .unwrap_or(DealStatus::Completed);
                return Err(DealLedgerError::AlreadyTerminal(status));
            },
        };
        if self.config.is_admin(acting_user_id) && !is_guarantor {
            self.db.record_action("deal_completed_admin", Some(acting_user_id), Some(deal_id), None).await?;
        }
        self.call_deal_completed_hook(&deal, acting_user_id).await;
        Ok(deal)
    }

    /// Cancels a non-terminal deal. Any participant (or the administrator) may cancel from any
    /// non-terminal state; the guarantor-called latch is cleared.
    pub async fn cancel_deal(&self, deal_id: i64, acting_user_id: i64) -> Result<Deal, DealLedgerError> {
        let deal =
            self.db.fetch_deal_by_id(deal_id).await?.ok_or(DealLedgerError::DealIdNotFound(deal_id))?;
        let is_admin = self.config.is_admin(acting_user_id);
        if !deal.is_participant(acting_user_id) && !is_admin {
            return Err(DealLedgerError::NotAParticipant { user_id: acting_user_id, deal_id });
        }
        if !deal.status.can_transition_to(DealStatus::Cancelled) {
            return Err(DealLedgerError::AlreadyTerminal(deal.status));
        }
        let role = if acting_user_id == deal.seller_id {
            "seller"
        } else if deal.buyer_id == Some(acting_user_id) {
            "buyer"
        } else if deal.guarantor_id == Some(acting_user_id) {
            "guarantor"
        } else {
            "administrator"
        };
        let note = format!("🔒 Chat closed. The deal was cancelled by the {role}.");
        let deal = match self.db.cancel_deal(deal_id, &note).await? {
            Some(deal) => deal,
            None => {
                let status = self
                    .db
                    .fetch_deal_by_id(deal_id)
                    .await?
                    .map(|d| d.status)
                    .unwrap_or(DealStatus::Cancelled);
                return Err(DealLedgerError::AlreadyTerminal(status));
            },
        };
        if is_admin && !deal.is_participant(acting_user_id) {
            self.db.record_action("deal_cancelled_admin", Some(acting_user_id), Some(deal_id), None).await?;
        }
        self.call_deal_cancelled_hook(&deal, acting_user_id).await;
        Ok(deal)
    }

    pub async fn deal_by_code(&self, code: &DealCode) -> Result<Option<Deal>, DealLedgerError> {
        self.db.fetch_deal_by_code(code).await
    }

    pub async fn deal_by_id(&self, deal_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        self.db.fetch_deal_by_id(deal_id).await
    }

    pub async fn active_deal_for(&self, user_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        self.db.active_deal_for_participant(user_id).await
    }

    pub async fn active_deal_for_guarantor(&self, guarantor_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        self.db.active_deal_for_guarantor(guarantor_id).await
    }

    pub async fn deals_awaiting_guarantor(&self) -> Result<Vec<Deal>, DealLedgerError> {
        self.db.deals_awaiting_guarantor().await
    }

    pub async fn history_for_user(&self, user_id: i64) -> Result<Vec<DealHistoryEntry>, DealLedgerError> {
        self.db.deal_history_for_user(user_id).await
    }

    pub async fn marketplace_stats(&self) -> Result<MarketplaceStats, DealLedgerError> {
        self.db.marketplace_stats().await
    }

    /// Purges unattended `waiting_buyer` deals older than the configured timeout. The reaper
    /// worker calls this on a timer; it is harmless to call it at any moment.
    pub async fn purge_stale_deals(&self) -> Result<u64, DealLedgerError> {
        self.db.purge_stale_deals(self.config.waiting_buyer_timeout).await
    }

    async fn known_good_user(&self, user_id: i64) -> Result<User, DealLedgerError> {
        let user = self
            .db
            .fetch_user(user_id)
            .await?
            .ok_or(DealLedgerError::AccountError(AccountApiError::UserNotFound(user_id)))?;
        if user.is_banned {
            return Err(DealLedgerError::UserBanned(user_id));
        }
        if self.db.is_scammer(user_id).await? {
            return Err(DealLedgerError::UserFlagged(user_id));
        }
        Ok(user)
    }

    async fn call_buyer_joined_hook(&self, deal: &Deal) {
        for emitter in &self.producers.buyer_joined_producer {
            let event = BuyerJoinedEvent::new(deal.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_guarantor_assigned_hook(&self, deal: &Deal) {
        for emitter in &self.producers.guarantor_assigned_producer {
            let event = GuarantorAssignedEvent::new(deal.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_deal_completed_hook(&self, deal: &Deal, completed_by: i64) {
        for emitter in &self.producers.deal_completed_producer {
            let event = DealCompletedEvent::new(deal.clone(), completed_by);
            emitter.publish_event(event).await;
        }
    }

    async fn call_deal_cancelled_hook(&self, deal: &Deal, cancelled_by: i64) {
        for emitter in &self.producers.deal_cancelled_producer {
            let event = DealCancelledEvent::new(deal.clone(), cancelled_by);
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
