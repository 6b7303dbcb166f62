use sqlx::SqliteConnection;

use crate::traits::AccountApiError;

pub async fn get_setting(key: &str, conn: &mut SqliteConnection) -> Result<Option<String>, AccountApiError> {
    let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1").bind(key).fetch_optional(conn).await?;
    Ok(value)
}

pub async fn set_setting(key: &str, value: &str, conn: &mut SqliteConnection) -> Result<(), AccountApiError> {
    sqlx::query("INSERT INTO settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO UPDATE SET value = excluded.value")
        .bind(key)
        .bind(value)
        .execute(conn)
        .await?;
    Ok(())
}
