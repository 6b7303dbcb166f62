use sqlx::SqliteConnection;

use crate::{
    db_types::{Currency, NewWallet, Wallet},
    traits::WalletApiError,
};

pub async fn insert_wallet(wallet: NewWallet, conn: &mut SqliteConnection) -> Result<Wallet, WalletApiError> {
    let wallet = sqlx::query_as(
        r#"
            INSERT INTO wallets (user_id, wallet_type, wallet_address)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(wallet.user_id)
    .bind(wallet.wallet_type)
    .bind(wallet.wallet_address)
    .fetch_one(conn)
    .await?;
    Ok(wallet)
}

pub async fn active_wallets_for_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Wallet>, WalletApiError> {
    let wallets = sqlx::query_as("SELECT * FROM wallets WHERE user_id = $1 AND is_active = TRUE ORDER BY created_at")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(wallets)
}

/// Soft delete. Historical deals keep referring to the deactivated wallet.
pub async fn deactivate_wallet(wallet_id: i64, user_id: i64, conn: &mut SqliteConnection) -> Result<bool, WalletApiError> {
    let result = sqlx::query("UPDATE wallets SET is_active = FALSE WHERE id = $1 AND user_id = $2 AND is_active = TRUE")
        .bind(wallet_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// The user's oldest active wallet that can receive a payout in `currency`.
pub async fn compatible_wallet(
    user_id: i64,
    currency: Currency,
    conn: &mut SqliteConnection,
) -> Result<Option<Wallet>, WalletApiError> {
    let type_filter = match currency {
        Currency::Rub => "AND wallet_type IN ('card')",
        Currency::Crypto => "AND wallet_type IN ('btc', 'usdt', 'ton')",
        // Star deals settle through the chat platform; any wallet proves the user set one up.
        Currency::Stars => "",
    };
    let query = format!(
        "SELECT * FROM wallets WHERE user_id = $1 AND is_active = TRUE {type_filter} ORDER BY created_at LIMIT 1"
    );
    let wallet = sqlx::query_as(&query).bind(user_id).fetch_optional(conn).await?;
    Ok(wallet)
}
