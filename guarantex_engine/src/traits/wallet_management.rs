use thiserror::Error;

use crate::{
    db_types::{Currency, NewWallet, Wallet},
    helpers::WalletValidationError,
};

/// Payout wallet bookkeeping. Wallets are soft-deleted (deactivated) so historical deals keep
/// their payout references.
#[allow(async_fn_in_trait)]
pub trait WalletManagement {
    async fn insert_wallet(&self, wallet: NewWallet) -> Result<Wallet, WalletApiError>;

    async fn active_wallets_for_user(&self, user_id: i64) -> Result<Vec<Wallet>, WalletApiError>;

    /// Deactivates the wallet if it belongs to `user_id`. Returns `false` when no active wallet
    /// matched.
    async fn deactivate_wallet(&self, wallet_id: i64, user_id: i64) -> Result<bool, WalletApiError>;

    /// The user's first active wallet that can receive a payout in `currency`, if any.
    async fn compatible_wallet(&self, user_id: i64, currency: Currency) -> Result<Option<Wallet>, WalletApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("{0}")]
    InvalidAddress(#[from] WalletValidationError),
    #[error("No wallet with id {0} exists for this user")]
    WalletNotFound(i64),
}

impl From<sqlx::Error> for WalletApiError {
    fn from(e: sqlx::Error) -> Self {
        WalletApiError::DatabaseError(e.to_string())
    }
}
