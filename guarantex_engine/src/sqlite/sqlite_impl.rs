//! `SqliteDatabase` is a concrete implementation of a Guarantex storage backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Multi-step flows (joining, completing, cancelling) compose the
//! low-level functions in [`super::db`] inside a single transaction.

use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sqlx::SqlitePool;

use super::db::{audit, db_url, deals, messages, new_pool, ratings, scammers, settings, users, wallets};
use crate::{
    db_types::{
        AuditEntry,
        Currency,
        Deal,
        DealCode,
        DealMessage,
        NewDeal,
        NewMessage,
        NewRating,
        NewWallet,
        Rating,
        ScammerRecord,
        User,
        Wallet,
    },
    traits::{
        AccountApiError,
        ChatSummary,
        DealHistoryEntry,
        DealLedgerDatabase,
        DealLedgerError,
        MarketplaceStats,
        MessageHit,
        RatingApiError,
        RatingManagement,
        SettingsManagement,
        ThreadApiError,
        ThreadManagement,
        UserManagement,
        WalletApiError,
        WalletManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object against the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Call once after connecting.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl DealLedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_deal(&self, deal: NewDeal, code: DealCode) -> Result<Deal, DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        deals::reserve_code(&code, &mut tx).await?;
        let seller_id = deal.seller_id;
        let deal = deals::insert_deal(deal, code, &mut tx).await?;
        audit::record(
            "deal_created",
            Some(seller_id),
            Some(deal.id),
            Some(&format!("Code: {}", deal.deal_code)),
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Deal [{}] has been saved in the DB with id {}", deal.deal_code, deal.id);
        Ok(deal)
    }

    async fn fetch_deal_by_code(&self, code: &DealCode) -> Result<Option<Deal>, DealLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deal = deals::fetch_deal_by_code(code, &mut conn).await?;
        Ok(deal)
    }

    async fn fetch_deal_by_id(&self, deal_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deal = deals::fetch_deal_by_id(deal_id, &mut conn).await?;
        Ok(deal)
    }

    async fn join_deal(&self, code: &DealCode, buyer_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        let deal = match deals::join_deal(code, buyer_id, &mut tx).await? {
            Some(deal) => deal,
            None => return Ok(None),
        };
        let buyer_name = users::fetch_user(buyer_id, &mut tx)
            .await?
            .map(|u| u.display_name())
            .unwrap_or_else(|| format!("ID{buyer_id}"));
        messages::insert_message(
            NewMessage::system(deal.id, format!("🔸 Buyer {buyer_name} joined the deal")),
            &mut tx,
        )
        .await?;
        audit::record("buyer_joined", Some(buyer_id), Some(deal.id), Some(&format!("Code: {code}")), &mut tx).await?;
        tx.commit().await?;
        Ok(Some(deal))
    }

    async fn set_guarantor_called(&self, deal_id: i64) -> Result<bool, DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        let latched = deals::set_guarantor_called(deal_id, &mut tx).await?;
        if latched {
            audit::record("guarantor_called", None, Some(deal_id), None, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(latched)
    }

    async fn reset_guarantor_called(&self, deal_id: i64) -> Result<(), DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        deals::reset_guarantor_called(deal_id, &mut tx).await?;
        audit::record("guarantor_call_reset", None, Some(deal_id), None, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn assign_guarantor(&self, deal_id: i64, guarantor_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        let deal = match deals::assign_guarantor(deal_id, guarantor_id, &mut tx).await? {
            Some(deal) => deal,
            None => return Ok(None),
        };
        let name = users::fetch_user(guarantor_id, &mut tx)
            .await?
            .map(|u| u.display_name())
            .unwrap_or_else(|| format!("ID{guarantor_id}"));
        messages::insert_message(
            NewMessage::system(deal.id, format!("👨‍💼 Guarantor {name} accepted the deal. The deal has started!")),
            &mut tx,
        )
        .await?;
        audit::record("guarantor_assigned", Some(guarantor_id), Some(deal_id), None, &mut tx).await?;
        tx.commit().await?;
        Ok(Some(deal))
    }

    /// The status flip, the closure message and both participants' counter increments ride the
    /// same transaction: statistics can never observe a completed deal without its counters.
    async fn complete_deal(&self, deal_id: i64, closure_note: &str) -> Result<Option<Deal>, DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        let deal = match deals::complete_deal(deal_id, &mut tx).await? {
            Some(deal) => deal,
            None => return Ok(None),
        };
        messages::insert_message(NewMessage::system(deal.id, closure_note), &mut tx).await?;
        if let Some(buyer_id) = deal.buyer_id {
            users::incr_deal_counters(deal.seller_id, buyer_id, &mut tx).await?;
        }
        audit::record("deal_completed", deal.guarantor_id, Some(deal_id), None, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Deal [{}] completed", deal.deal_code);
        Ok(Some(deal))
    }

    async fn cancel_deal(&self, deal_id: i64, closure_note: &str) -> Result<Option<Deal>, DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        let deal = match deals::cancel_deal(deal_id, &mut tx).await? {
            Some(deal) => deal,
            None => return Ok(None),
        };
        messages::insert_message(NewMessage::system(deal.id, closure_note), &mut tx).await?;
        audit::record("deal_cancelled", None, Some(deal_id), None, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Deal [{}] cancelled", deal.deal_code);
        Ok(Some(deal))
    }

    async fn active_deal_for_participant(&self, user_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deal = deals::active_deal_for_participant(user_id, &mut conn).await?;
        Ok(deal)
    }

    async fn active_deal_for_guarantor(&self, guarantor_id: i64) -> Result<Option<Deal>, DealLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deal = deals::active_deal_for_guarantor(guarantor_id, &mut conn).await?;
        Ok(deal)
    }

    async fn deals_awaiting_guarantor(&self) -> Result<Vec<Deal>, DealLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let deals = deals::deals_awaiting_guarantor(&mut conn).await?;
        Ok(deals)
    }

    async fn deal_history_for_user(&self, user_id: i64) -> Result<Vec<DealHistoryEntry>, DealLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let history = deals::history_for_user(user_id, &mut conn).await?;
        Ok(history)
    }

    async fn purge_stale_deals(&self, older_than: Duration) -> Result<u64, DealLedgerError> {
        let mut tx = self.pool.begin().await?;
        let purged = deals::purge_stale_deals(older_than, &mut tx).await?;
        if purged > 0 {
            audit::record("stale_deals_purged", None, None, Some(&format!("Purged: {purged}")), &mut tx).await?;
        }
        tx.commit().await?;
        Ok(purged)
    }

    async fn marketplace_stats(&self) -> Result<MarketplaceStats, DealLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let stats = deals::marketplace_stats(&mut conn).await?;
        Ok(stats)
    }

    async fn close(&mut self) -> Result<(), DealLedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl UserManagement for SqliteDatabase {
    async fn upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<User, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        users::upsert_user(user_id, username, first_name, &mut conn).await
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(user_id, &mut conn).await
    }

    async fn set_banned(&self, user_id: i64, banned: bool) -> Result<(), AccountApiError> {
        let mut tx = self.pool.begin().await?;
        users::set_banned(user_id, banned, &mut tx).await?;
        let action = if banned { "user_banned" } else { "user_unbanned" };
        audit::record(action, Some(user_id), None, None, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_guarantor(&self, user_id: i64, is_guarantor: bool) -> Result<(), AccountApiError> {
        let mut tx = self.pool.begin().await?;
        users::set_guarantor(user_id, is_guarantor, &mut tx).await?;
        let action = if is_guarantor { "guarantor_added" } else { "guarantor_removed" };
        audit::record(action, Some(user_id), None, None, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn adjust_balance(&self, user_id: i64, currency: Currency, delta: i64) -> Result<(), AccountApiError> {
        let mut tx = self.pool.begin().await?;
        users::adjust_balance(user_id, currency, delta, &mut tx).await?;
        audit::record("balance_updated", Some(user_id), None, Some(&format!("Delta: {delta} {currency}")), &mut tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn all_guarantors(&self) -> Result<Vec<User>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        users::all_guarantors(&mut conn).await
    }

    async fn eligible_guarantors(&self) -> Result<Vec<User>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        users::eligible_guarantors(&mut conn).await
    }

    async fn list_users(&self) -> Result<Vec<User>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        users::list_users(&mut conn).await
    }

    async fn is_scammer(&self, user_id: i64) -> Result<bool, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        scammers::is_scammer(user_id, &mut conn).await
    }

    async fn scammer_record(&self, user_id: i64) -> Result<Option<ScammerRecord>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        scammers::scammer_record(user_id, &mut conn).await
    }

    async fn add_scammer(&self, user_id: i64, reason: &str, added_by: i64) -> Result<(), AccountApiError> {
        let mut tx = self.pool.begin().await?;
        scammers::add_scammer(user_id, reason, added_by, &mut tx).await?;
        audit::record("scammer_added", Some(added_by), None, Some(&format!("User ID: {user_id}")), &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_scammer(&self, user_id: i64) -> Result<bool, AccountApiError> {
        let mut tx = self.pool.begin().await?;
        let removed = scammers::remove_scammer(user_id, &mut tx).await?;
        if removed {
            audit::record("scammer_removed", None, None, Some(&format!("User ID: {user_id}")), &mut tx).await?;
        }
        tx.commit().await?;
        Ok(removed)
    }

    async fn list_scammers(&self) -> Result<Vec<ScammerRecord>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        scammers::list_scammers(&mut conn).await
    }

    async fn record_action(
        &self,
        action: &str,
        user_id: Option<i64>,
        deal_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<(), AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        audit::record(action, user_id, deal_id, details, &mut conn).await
    }

    async fn recent_actions(&self, limit: i64) -> Result<Vec<AuditEntry>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        audit::recent(limit, &mut conn).await
    }
}

impl SettingsManagement for SqliteDatabase {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        settings::get_setting(key, &mut conn).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), AccountApiError> {
        let mut tx = self.pool.begin().await?;
        settings::set_setting(key, value, &mut tx).await?;
        audit::record("setting_changed", None, None, Some(&format!("{key}: {value}")), &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

impl WalletManagement for SqliteDatabase {
    async fn insert_wallet(&self, wallet: NewWallet) -> Result<Wallet, WalletApiError> {
        let mut tx = self.pool.begin().await.map_err(WalletApiError::from)?;
        let wallet = wallets::insert_wallet(wallet, &mut tx).await?;
        audit::record(
            "wallet_added",
            Some(wallet.user_id),
            None,
            Some(&format!("{}: {}", wallet.wallet_type, wallet.wallet_address)),
            &mut tx,
        )
        .await
        .map_err(|e| WalletApiError::DatabaseError(e.to_string()))?;
        tx.commit().await.map_err(WalletApiError::from)?;
        Ok(wallet)
    }

    async fn active_wallets_for_user(&self, user_id: i64) -> Result<Vec<Wallet>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        wallets::active_wallets_for_user(user_id, &mut conn).await
    }

    async fn deactivate_wallet(&self, wallet_id: i64, user_id: i64) -> Result<bool, WalletApiError> {
        let mut tx = self.pool.begin().await.map_err(WalletApiError::from)?;
        let deactivated = wallets::deactivate_wallet(wallet_id, user_id, &mut tx).await?;
        if deactivated {
            audit::record("wallet_deleted", Some(user_id), None, Some(&format!("Wallet ID: {wallet_id}")), &mut tx)
                .await
                .map_err(|e| WalletApiError::DatabaseError(e.to_string()))?;
        }
        tx.commit().await.map_err(WalletApiError::from)?;
        Ok(deactivated)
    }

    async fn compatible_wallet(&self, user_id: i64, currency: Currency) -> Result<Option<Wallet>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        wallets::compatible_wallet(user_id, currency, &mut conn).await
    }
}

impl ThreadManagement for SqliteDatabase {
    async fn insert_message(&self, message: NewMessage) -> Result<DealMessage, ThreadApiError> {
        let mut conn = self.pool.acquire().await?;
        messages::insert_message(message, &mut conn).await
    }

    async fn messages_for_deal(&self, deal_id: i64, limit: i64) -> Result<Vec<DealMessage>, ThreadApiError> {
        let mut conn = self.pool.acquire().await?;
        messages::messages_for_deal(deal_id, limit, &mut conn).await
    }

    async fn unread_count(&self, deal_id: i64, reader_id: i64) -> Result<i64, ThreadApiError> {
        let mut conn = self.pool.acquire().await?;
        messages::unread_count(deal_id, reader_id, &mut conn).await
    }

    async fn mark_messages_read(&self, deal_id: i64, reader_id: i64) -> Result<u64, ThreadApiError> {
        let mut conn = self.pool.acquire().await?;
        messages::mark_messages_read(deal_id, reader_id, &mut conn).await
    }

    async fn message_counts_by_sender(&self, deal_id: i64) -> Result<Vec<(i64, i64)>, ThreadApiError> {
        let mut conn = self.pool.acquire().await?;
        messages::counts_by_sender(deal_id, &mut conn).await
    }

    async fn chat_summaries(&self, limit: i64) -> Result<Vec<ChatSummary>, ThreadApiError> {
        let mut conn = self.pool.acquire().await?;
        messages::chat_summaries(limit, &mut conn).await
    }

    async fn search_messages(&self, term: &str, limit: i64) -> Result<Vec<MessageHit>, ThreadApiError> {
        let mut conn = self.pool.acquire().await?;
        messages::search_messages(term, limit, &mut conn).await
    }
}

impl RatingManagement for SqliteDatabase {
    async fn insert_rating(&self, rating: NewRating) -> Result<Rating, RatingApiError> {
        let mut tx = self.pool.begin().await?;
        let rating = ratings::insert_rating(rating, &mut tx).await?;
        audit::record(
            "rating_added",
            Some(rating.rater_id),
            Some(rating.deal_id),
            Some(&format!("Score: {}", rating.score)),
            &mut tx,
        )
        .await
        .map_err(|e| RatingApiError::DatabaseError(e.to_string()))?;
        tx.commit().await?;
        Ok(rating)
    }

    async fn recalculate_rating(&self, user_id: i64, min_count: i64) -> Result<Option<f64>, RatingApiError> {
        let mut conn = self.pool.acquire().await?;
        ratings::recalculate_rating(user_id, min_count, &mut conn).await
    }

    async fn ratings_for_user(&self, user_id: i64) -> Result<Vec<Rating>, RatingApiError> {
        let mut conn = self.pool.acquire().await?;
        ratings::ratings_for_user(user_id, &mut conn).await
    }
}
