use log::*;

use crate::{
    config::EngineConfig,
    db_types::{AuditEntry, Currency, NewWallet, ScammerRecord, User, Wallet, WalletType},
    helpers::validate_wallet,
    traits::{AccountApiError, SettingsManagement, UserManagement, WalletApiError, WalletManagement},
};

/// Identity, wallets, the scammer denylist and operational settings.
///
/// The mutating administrative operations (bans, guarantor toggles, balance adjustments, the
/// denylist, maintenance mode) all require the configured administrator identity and are
/// recorded in the audit log by the backend.
pub struct AccountApi<B> {
    db: B,
    config: EngineConfig,
}

impl<B> AccountApi<B>
where B: UserManagement + WalletManagement + SettingsManagement
{
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config }
    }

    /// Registers the user on first contact, refreshing the display fields on repeat visits.
    pub async fn register_contact(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<User, AccountApiError> {
        let user = self.db.upsert_user(user_id, username, first_name).await?;
        trace!("🧑️ Contact from {} ({user_id})", user.display_name());
        Ok(user)
    }

    pub async fn user(&self, user_id: i64) -> Result<Option<User>, AccountApiError> {
        self.db.fetch_user(user_id).await
    }

    pub async fn set_banned(&self, acting_user_id: i64, target: i64, banned: bool) -> Result<(), AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.set_banned(target, banned).await
    }

    pub async fn set_guarantor(
        &self,
        acting_user_id: i64,
        target: i64,
        is_guarantor: bool,
    ) -> Result<(), AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.set_guarantor(target, is_guarantor).await
    }

    /// Manual balance adjustment, in minor units (whole stars for [`Currency::Stars`]).
    pub async fn adjust_balance(
        &self,
        acting_user_id: i64,
        target: i64,
        currency: Currency,
        delta: i64,
    ) -> Result<(), AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.adjust_balance(target, currency, delta).await
    }

    pub async fn list_users(&self, acting_user_id: i64) -> Result<Vec<User>, AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.list_users().await
    }

    /// Validates the address and stores the wallet. Returns the stored record with the address
    /// in canonical form.
    pub async fn add_wallet(
        &self,
        user_id: i64,
        wallet_type: WalletType,
        address: &str,
    ) -> Result<Wallet, WalletApiError> {
        let wallet_address = validate_wallet(wallet_type, address)?;
        let wallet = self.db.insert_wallet(NewWallet { user_id, wallet_type, wallet_address }).await?;
        debug!("👛️ User {user_id} added a {wallet_type} wallet");
        Ok(wallet)
    }

    /// Deactivates (never deletes) the wallet, preserving historical deal references.
    pub async fn remove_wallet(&self, user_id: i64, wallet_id: i64) -> Result<(), WalletApiError> {
        if self.db.deactivate_wallet(wallet_id, user_id).await? {
            Ok(())
        } else {
            Err(WalletApiError::WalletNotFound(wallet_id))
        }
    }

    pub async fn wallets(&self, user_id: i64) -> Result<Vec<Wallet>, WalletApiError> {
        self.db.active_wallets_for_user(user_id).await
    }

    pub async fn is_scammer(&self, user_id: i64) -> Result<bool, AccountApiError> {
        self.db.is_scammer(user_id).await
    }

    pub async fn scammer_record(&self, user_id: i64) -> Result<Option<ScammerRecord>, AccountApiError> {
        self.db.scammer_record(user_id).await
    }

    pub async fn add_scammer(
        &self,
        acting_user_id: i64,
        target: i64,
        reason: &str,
    ) -> Result<(), AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.add_scammer(target, reason, acting_user_id).await
    }

    pub async fn remove_scammer(&self, acting_user_id: i64, target: i64) -> Result<bool, AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.remove_scammer(target).await
    }

    pub async fn list_scammers(&self, acting_user_id: i64) -> Result<Vec<ScammerRecord>, AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.list_scammers().await
    }

    pub async fn is_maintenance_mode(&self) -> Result<bool, AccountApiError> {
        self.db.is_maintenance_mode().await
    }

    pub async fn set_maintenance_mode(&self, acting_user_id: i64, enabled: bool) -> Result<(), AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.set_setting("maintenance_mode", if enabled { "true" } else { "false" }).await
    }

    pub async fn recent_actions(&self, acting_user_id: i64, limit: i64) -> Result<Vec<AuditEntry>, AccountApiError> {
        self.require_admin(acting_user_id)?;
        self.db.recent_actions(limit).await
    }

    fn require_admin(&self, user_id: i64) -> Result<(), AccountApiError> {
        if self.config.is_admin(user_id) {
            Ok(())
        } else {
            Err(AccountApiError::NotAuthorized(user_id))
        }
    }
}
