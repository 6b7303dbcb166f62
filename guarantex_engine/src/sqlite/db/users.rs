use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Currency, User},
    traits::AccountApiError,
};

/// Creates the user on first contact, or refreshes the display fields if the row already exists.
pub async fn upsert_user(
    user_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<User, AccountApiError> {
    let user = sqlx::query_as(
        r#"
            INSERT INTO users (user_id, username, first_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET username = excluded.username, first_name = excluded.first_name
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(username)
    .bind(first_name)
    .fetch_one(conn)
    .await?;
    Ok(user)
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, AccountApiError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn set_banned(user_id: i64, banned: bool, conn: &mut SqliteConnection) -> Result<(), AccountApiError> {
    let result =
        sqlx::query("UPDATE users SET is_banned = $1 WHERE user_id = $2").bind(banned).bind(user_id).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(AccountApiError::UserNotFound(user_id));
    }
    Ok(())
}

pub async fn set_guarantor(user_id: i64, is_guarantor: bool, conn: &mut SqliteConnection) -> Result<(), AccountApiError> {
    let result = sqlx::query("UPDATE users SET is_guarantor = $1 WHERE user_id = $2")
        .bind(is_guarantor)
        .bind(user_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AccountApiError::UserNotFound(user_id));
    }
    Ok(())
}

/// Applies a signed balance delta in the column matching the currency.
pub async fn adjust_balance(
    user_id: i64,
    currency: Currency,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<(), AccountApiError> {
    let column = match currency {
        Currency::Stars => "balance_stars",
        Currency::Crypto => "balance_crypto",
        Currency::Rub => "balance_rub",
    };
    let query = format!("UPDATE users SET {column} = {column} + $1 WHERE user_id = $2");
    let result = sqlx::query(&query).bind(delta).bind(user_id).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(AccountApiError::UserNotFound(user_id));
    }
    trace!("🧑️ Balance of user {user_id} adjusted by {delta} {currency}");
    Ok(())
}

/// Bumps `total_deals` and `completed_deals` for both participants of a completed deal.
pub(crate) async fn incr_deal_counters(
    seller_id: i64,
    buyer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(), AccountApiError> {
    sqlx::query(
        "UPDATE users SET total_deals = total_deals + 1, completed_deals = completed_deals + 1 WHERE user_id IN ($1, $2)",
    )
    .bind(seller_id)
    .bind(buyer_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn all_guarantors(conn: &mut SqliteConnection) -> Result<Vec<User>, AccountApiError> {
    let users = sqlx::query_as("SELECT * FROM users WHERE is_guarantor = TRUE AND is_banned = FALSE")
        .fetch_all(conn)
        .await?;
    Ok(users)
}

/// Guarantors free to take on a new deal. Busy guarantors are filtered out here, in SQL, so the
/// dispatch path never has to iterate per-guarantor busy checks.
pub async fn eligible_guarantors(conn: &mut SqliteConnection) -> Result<Vec<User>, AccountApiError> {
    let users = sqlx::query_as(
        r#"
            SELECT * FROM users u
            WHERE u.is_guarantor = TRUE
              AND u.is_banned = FALSE
              AND NOT EXISTS (
                SELECT 1 FROM deals d WHERE d.guarantor_id = u.user_id AND d.status = 'in_progress'
              )
        "#,
    )
    .fetch_all(conn)
    .await?;
    Ok(users)
}

pub async fn list_users(conn: &mut SqliteConnection) -> Result<Vec<User>, AccountApiError> {
    let users = sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC").fetch_all(conn).await?;
    Ok(users)
}
