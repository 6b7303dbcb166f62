use futures_util::future::join_all;
use log::*;

use crate::{
    config::EngineConfig,
    db_types::{Deal, DealStatus},
    helpers::format_amount,
    traits::{
        DealLedgerDatabase,
        DealLedgerError,
        DispatchReport,
        NotificationSink,
        NotifyAction,
        UserManagement,
    },
};

/// Broadcasts deals that need mediation to every free guarantor and lets the ledger arbitrate
/// the first acceptance.
///
/// Dispatch is best-effort: a failed send never fails the operation, it only shows up in the
/// [`DispatchReport`] tally. If a round reaches nobody, the one-shot call latch is rolled back
/// so the parties may summon again later.
pub struct GuarantorDispatch<B, S> {
    db: B,
    sink: S,
    config: EngineConfig,
}

impl<B, S> GuarantorDispatch<B, S>
where
    B: DealLedgerDatabase + UserManagement,
    S: NotificationSink,
{
    pub fn new(db: B, sink: S, config: EngineConfig) -> Self {
        Self { db, sink, config }
    }

    /// Summons a guarantor for the caller's deal.
    ///
    /// Valid only while the deal is `waiting_guarantor`, only for its participants, and only
    /// once per latch cycle; a repeat call is rejected with
    /// [`DealLedgerError::GuarantorAlreadyCalled`] until the latch is reset.
    pub async fn call_guarantor(&self, deal_id: i64, caller_id: i64) -> Result<DispatchReport, DealLedgerError> {
        let deal = self.db.fetch_deal_by_id(deal_id).await?.ok_or(DealLedgerError::DealIdNotFound(deal_id))?;
        if !deal.is_participant(caller_id) && !self.config.is_admin(caller_id) {
            return Err(DealLedgerError::NotAParticipant { user_id: caller_id, deal_id });
        }
        match deal.status {
            DealStatus::WaitingGuarantor => {},
            s if s.is_terminal() => return Err(DealLedgerError::AlreadyTerminal(s)),
            _ => return Err(DealLedgerError::DealUnavailable),
        }
        if !self.db.set_guarantor_called(deal_id).await? {
            return Err(DealLedgerError::GuarantorAlreadyCalled);
        }

        let all = self.db.all_guarantors().await?;
        let eligible = self.db.eligible_guarantors().await?;
        let skipped_busy = all.len().saturating_sub(eligible.len());
        let text = self.summons_text(&deal).await?;
        let actions = [
            NotifyAction::new("✅ Accept", format!("accept_deal_{deal_id}")),
            NotifyAction::new("❌ Decline", format!("decline_deal_{deal_id}")),
        ];

        let sends = eligible.iter().map(|guarantor| self.sink.send(guarantor.user_id, &text, &actions));
        let outcomes = join_all(sends).await;
        let mut report = DispatchReport { notified: 0, skipped_busy, failed: 0 };
        for (guarantor, outcome) in eligible.iter().zip(outcomes) {
            match outcome {
                Ok(_) => report.notified += 1,
                Err(e) => {
                    warn!("📣️ Could not summon guarantor {}: {e}", guarantor.user_id);
                    report.failed += 1;
                },
            }
        }

        if !report.reached_anyone() {
            // Nobody heard the summons; arm the latch again so the parties can retry.
            warn!(
                "📣️ Dispatch for deal [{}] reached no guarantor ({} busy, {} failed). Resetting the call latch.",
                deal.deal_code, report.skipped_busy, report.failed
            );
            self.db.reset_guarantor_called(deal_id).await?;
        } else {
            info!("📣️ Deal [{}] dispatched to {} guarantor(s)", deal.deal_code, report.notified);
        }
        Ok(report)
    }

    async fn summons_text(&self, deal: &Deal) -> Result<String, DealLedgerError> {
        let seller_name = self.display_name_of(deal.seller_id).await?;
        let buyer_name = match deal.buyer_id {
            Some(id) => self.display_name_of(id).await?,
            None => "—".to_string(),
        };
        Ok(format!(
            "🛎️ Deal #{} [{}] needs a guarantor\n\nAmount: {}\nSeller: {seller_name}\nBuyer: {buyer_name}\n\n{}",
            deal.id,
            deal.deal_code,
            format_amount(deal.amount, deal.currency),
            deal.description
        ))
    }

    async fn display_name_of(&self, user_id: i64) -> Result<String, DealLedgerError> {
        let name = self
            .db
            .fetch_user(user_id)
            .await?
            .map(|u| u.display_name())
            .unwrap_or_else(|| format!("ID{user_id}"));
        Ok(name)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
