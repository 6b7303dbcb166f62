use sqlx::SqliteConnection;

use crate::{db_types::ScammerRecord, traits::AccountApiError};

pub async fn add_scammer(
    user_id: i64,
    reason: &str,
    added_by: i64,
    conn: &mut SqliteConnection,
) -> Result<(), AccountApiError> {
    sqlx::query(
        r#"
            INSERT INTO scammers (user_id, reason, added_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET reason = excluded.reason, added_by = excluded.added_by
        "#,
    )
    .bind(user_id)
    .bind(reason)
    .bind(added_by)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn remove_scammer(user_id: i64, conn: &mut SqliteConnection) -> Result<bool, AccountApiError> {
    let result = sqlx::query("DELETE FROM scammers WHERE user_id = $1").bind(user_id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn is_scammer(user_id: i64, conn: &mut SqliteConnection) -> Result<bool, AccountApiError> {
    let hit: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM scammers WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(hit.is_some())
}

pub async fn scammer_record(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ScammerRecord>, AccountApiError> {
    let record =
        sqlx::query_as("SELECT * FROM scammers WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(record)
}

pub async fn list_scammers(conn: &mut SqliteConnection) -> Result<Vec<ScammerRecord>, AccountApiError> {
    let records = sqlx::query_as("SELECT * FROM scammers ORDER BY created_at DESC").fetch_all(conn).await?;
    Ok(records)
}
