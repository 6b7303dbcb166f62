use thiserror::Error;

use crate::db_types::{AuditEntry, Currency, ScammerRecord, User};

/// User identity, reputation bookkeeping, the scammer denylist and the audit log.
#[allow(async_fn_in_trait)]
pub trait UserManagement {
    /// Creates the user on first contact, or refreshes the display fields on a repeat visit.
    async fn upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<User, AccountApiError>;

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, AccountApiError>;

    async fn set_banned(&self, user_id: i64, banned: bool) -> Result<(), AccountApiError>;

    async fn set_guarantor(&self, user_id: i64, is_guarantor: bool) -> Result<(), AccountApiError>;

    /// Applies a signed delta (in minor units, or whole stars for [`Currency::Stars`]) to the
    /// user's balance in the given currency.
    async fn adjust_balance(&self, user_id: i64, currency: Currency, delta: i64) -> Result<(), AccountApiError>;

    /// Unbanned users carrying the guarantor flag.
    async fn all_guarantors(&self) -> Result<Vec<User>, AccountApiError>;

    /// [`Self::all_guarantors`] minus those currently mediating an `in_progress` deal. Busy
    /// guarantors are skipped, not queued.
    async fn eligible_guarantors(&self) -> Result<Vec<User>, AccountApiError>;

    async fn list_users(&self) -> Result<Vec<User>, AccountApiError>;

    async fn is_scammer(&self, user_id: i64) -> Result<bool, AccountApiError>;

    async fn scammer_record(&self, user_id: i64) -> Result<Option<ScammerRecord>, AccountApiError>;

    async fn add_scammer(&self, user_id: i64, reason: &str, added_by: i64) -> Result<(), AccountApiError>;

    async fn remove_scammer(&self, user_id: i64) -> Result<bool, AccountApiError>;

    async fn list_scammers(&self) -> Result<Vec<ScammerRecord>, AccountApiError>;

    /// Appends one row to the audit log.
    async fn record_action(
        &self,
        action: &str,
        user_id: Option<i64>,
        deal_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<(), AccountApiError>;

    async fn recent_actions(&self, limit: i64) -> Result<Vec<AuditEntry>, AccountApiError>;
}

/// The small key-value settings store (e.g. the maintenance-mode flag).
#[allow(async_fn_in_trait)]
pub trait SettingsManagement {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, AccountApiError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), AccountApiError>;

    async fn is_maintenance_mode(&self) -> Result<bool, AccountApiError> {
        Ok(self.get_setting("maintenance_mode").await?.as_deref() == Some("true"))
    }
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("User {0} does not exist")]
    UserNotFound(i64),
    #[error("User {0} is not authorized to perform this action")]
    NotAuthorized(i64),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}
