use sqlx::SqliteConnection;

use crate::{db_types::AuditEntry, traits::AccountApiError};

/// Appends one audit row. Every state-changing action records who did what to which deal.
pub async fn record(
    action: &str,
    user_id: Option<i64>,
    deal_id: Option<i64>,
    details: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), AccountApiError> {
    sqlx::query("INSERT INTO logs (action, user_id, deal_id, details) VALUES ($1, $2, $3, $4)")
        .bind(action)
        .bind(user_id)
        .bind(deal_id)
        .bind(details)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn recent(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<AuditEntry>, AccountApiError> {
    let entries = sqlx::query_as("SELECT * FROM logs ORDER BY created_at DESC, id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
