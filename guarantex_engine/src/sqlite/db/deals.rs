use chrono::Duration;
use gtx_common::Money;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Deal, DealCode, NewDeal},
    sqlite::db::is_unique_violation,
    traits::{DealHistoryEntry, DealLedgerError, MarketplaceStats},
};

/// Reserves the code forever. A code that was ever issued — even for a deal the reaper later
/// purged — fails the reservation, so callers regenerate and retry.
pub async fn reserve_code(code: &DealCode, conn: &mut SqliteConnection) -> Result<(), DealLedgerError> {
    sqlx::query("INSERT INTO deal_codes (code) VALUES ($1)").bind(code).execute(conn).await.map_err(|e| {
        if is_unique_violation(&e) {
            DealLedgerError::CodeAlreadyIssued(code.clone())
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub async fn insert_deal(deal: NewDeal, code: DealCode, conn: &mut SqliteConnection) -> Result<Deal, DealLedgerError> {
    let deal = sqlx::query_as(
        r#"
            INSERT INTO deals (deal_code, seller_id, currency, amount, description, commission_percent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(code)
    .bind(deal.seller_id)
    .bind(deal.currency)
    .bind(deal.amount)
    .bind(deal.description)
    .bind(deal.commission_percent)
    .fetch_one(conn)
    .await?;
    Ok(deal)
}

pub async fn fetch_deal_by_code(code: &DealCode, conn: &mut SqliteConnection) -> Result<Option<Deal>, sqlx::Error> {
    let deal = sqlx::query_as("SELECT * FROM deals WHERE deal_code = $1").bind(code).fetch_optional(conn).await?;
    Ok(deal)
}

pub async fn fetch_deal_by_id(deal_id: i64, conn: &mut SqliteConnection) -> Result<Option<Deal>, sqlx::Error> {
    let deal = sqlx::query_as("SELECT * FROM deals WHERE id = $1").bind(deal_id).fetch_optional(conn).await?;
    Ok(deal)
}

/// The buyer-join arbitration point. Of N concurrent joiners with the same code, the guards
/// let exactly one row update through; everyone else gets `None`.
pub async fn join_deal(
    code: &DealCode,
    buyer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Deal>, DealLedgerError> {
    let deal: Option<Deal> = sqlx::query_as(
        r#"
            UPDATE deals SET buyer_id = $1, status = 'waiting_guarantor'
            WHERE deal_code = $2 AND status = 'waiting_buyer' AND buyer_id IS NULL
            RETURNING *;
        "#,
    )
    .bind(buyer_id)
    .bind(code)
    .fetch_optional(conn)
    .await?;
    if let Some(d) = &deal {
        debug!("🤝️ Buyer {buyer_id} joined deal [{}] (#{})", d.deal_code, d.id);
    }
    Ok(deal)
}

/// One-shot latch. Returns `false` when the latch was already set.
pub async fn set_guarantor_called(deal_id: i64, conn: &mut SqliteConnection) -> Result<bool, DealLedgerError> {
    let result = sqlx::query("UPDATE deals SET guarantor_called = TRUE WHERE id = $1 AND guarantor_called = FALSE")
        .bind(deal_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn reset_guarantor_called(deal_id: i64, conn: &mut SqliteConnection) -> Result<(), DealLedgerError> {
    sqlx::query("UPDATE deals SET guarantor_called = FALSE WHERE id = $1").bind(deal_id).execute(conn).await?;
    Ok(())
}

/// The guarantor-accept arbitration point. The status/guarantor guards let the first acceptor
/// through; the partial unique index on in-progress guarantors turns the rare double-accept by
/// one guarantor into a unique violation, reported as [`DealLedgerError::GuarantorBusy`].
pub async fn assign_guarantor(
    deal_id: i64,
    guarantor_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Deal>, DealLedgerError> {
    let deal: Option<Deal> = sqlx::query_as(
        r#"
            UPDATE deals SET guarantor_id = $1, status = 'in_progress', started_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND status = 'waiting_guarantor' AND guarantor_id IS NULL
            RETURNING *;
        "#,
    )
    .bind(guarantor_id)
    .bind(deal_id)
    .fetch_optional(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DealLedgerError::GuarantorBusy(guarantor_id)
        } else {
            DealLedgerError::from(e)
        }
    })?;
    if deal.is_some() {
        debug!("🤝️ Guarantor {guarantor_id} accepted deal #{deal_id}");
    }
    Ok(deal)
}

/// Conditional on `in_progress`; a second completer matches zero rows and gets `None`.
pub async fn complete_deal(deal_id: i64, conn: &mut SqliteConnection) -> Result<Option<Deal>, DealLedgerError> {
    let deal = sqlx::query_as(
        r#"
            UPDATE deals SET status = 'completed', completed_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *;
        "#,
    )
    .bind(deal_id)
    .fetch_optional(conn)
    .await?;
    Ok(deal)
}

/// Conditional on any non-terminal status. Also drops the guarantor-called latch so the record
/// reads consistently in history views.
pub async fn cancel_deal(deal_id: i64, conn: &mut SqliteConnection) -> Result<Option<Deal>, DealLedgerError> {
    let deal = sqlx::query_as(
        r#"
            UPDATE deals SET status = 'cancelled', guarantor_called = FALSE, completed_at = CURRENT_TIMESTAMP
            WHERE id = $1 AND status IN ('waiting_buyer', 'waiting_guarantor', 'in_progress')
            RETURNING *;
        "#,
    )
    .bind(deal_id)
    .fetch_optional(conn)
    .await?;
    Ok(deal)
}

pub async fn active_deal_for_participant(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Deal>, sqlx::Error> {
    let deal = sqlx::query_as(
        r#"
            SELECT * FROM deals
            WHERE (seller_id = $1 OR buyer_id = $1)
              AND status IN ('waiting_buyer', 'waiting_guarantor', 'in_progress')
            LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(deal)
}

pub async fn active_deal_for_guarantor(
    guarantor_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Deal>, sqlx::Error> {
    let deal = sqlx::query_as("SELECT * FROM deals WHERE guarantor_id = $1 AND status = 'in_progress'")
        .bind(guarantor_id)
        .fetch_optional(conn)
        .await?;
    Ok(deal)
}

pub async fn deals_awaiting_guarantor(conn: &mut SqliteConnection) -> Result<Vec<Deal>, sqlx::Error> {
    let deals = sqlx::query_as("SELECT * FROM deals WHERE status = 'waiting_guarantor' ORDER BY created_at ASC")
        .fetch_all(conn)
        .await?;
    Ok(deals)
}

/// Full history for a user in any role, newest first, with display names joined in.
pub async fn history_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<DealHistoryEntry>, sqlx::Error> {
    let entries = sqlx::query_as(
        r#"
            SELECT d.*,
                   COALESCE(s.first_name, s.username) AS seller_name,
                   COALESCE(b.first_name, b.username) AS buyer_name,
                   COALESCE(g.first_name, g.username) AS guarantor_name
            FROM deals d
            LEFT JOIN users s ON d.seller_id = s.user_id
            LEFT JOIN users b ON d.buyer_id = b.user_id
            LEFT JOIN users g ON d.guarantor_id = g.user_id
            WHERE d.seller_id = $1 OR d.buyer_id = $1 OR d.guarantor_id = $1
            ORDER BY d.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// Hard-deletes unattended `waiting_buyer` deals older than `limit`, together with any thread
/// messages they accumulated. The `deal_codes` reservations stay behind.
pub async fn purge_stale_deals(limit: Duration, conn: &mut SqliteConnection) -> Result<u64, DealLedgerError> {
    let cutoff = limit.num_seconds();
    sqlx::query(
        format!(
            "DELETE FROM deal_messages WHERE deal_id IN (SELECT id FROM deals WHERE status = 'waiting_buyer' AND \
             (unixepoch(CURRENT_TIMESTAMP) - unixepoch(created_at)) > {cutoff})"
        )
        .as_str(),
    )
    .execute(&mut *conn)
    .await?;
    let result = sqlx::query(
        format!(
            "DELETE FROM deals WHERE status = 'waiting_buyer' AND (unixepoch(CURRENT_TIMESTAMP) - \
             unixepoch(created_at)) > {cutoff}"
        )
        .as_str(),
    )
    .execute(conn)
    .await?;
    let purged = result.rows_affected();
    trace!("🕰️ Purged {purged} unattended deals");
    Ok(purged)
}

pub async fn marketplace_stats(conn: &mut SqliteConnection) -> Result<MarketplaceStats, sqlx::Error> {
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&mut *conn).await?;
    let banned_users: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_banned = TRUE").fetch_one(&mut *conn).await?;
    let guarantors: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_guarantor = TRUE").fetch_one(&mut *conn).await?;
    let total_deals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals").fetch_one(&mut *conn).await?;
    let active_deals: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM deals WHERE status IN ('waiting_buyer', 'waiting_guarantor', 'in_progress')",
    )
    .fetch_one(&mut *conn)
    .await?;
    let completed_deals: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM deals WHERE status = 'completed'").fetch_one(&mut *conn).await?;
    let cancelled_deals: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM deals WHERE status = 'cancelled'").fetch_one(&mut *conn).await?;
    let completed_volume: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM deals WHERE status = 'completed'")
            .fetch_one(conn)
            .await?;
    Ok(MarketplaceStats {
        total_users,
        banned_users,
        guarantors,
        total_deals,
        active_deals,
        completed_deals,
        cancelled_deals,
        completed_volume: Money::from(completed_volume),
    })
}
