//! Identity surface: first-contact registration, wallet validation and soft deletion, the
//! administrative gates, and the maintenance flag.

mod support;

use guarantex_engine::{
    db_types::WalletType,
    helpers::WalletValidationError,
    traits::{AccountApiError, UserManagement, WalletApiError},
    AccountApi,
};
use support::*;

#[tokio::test]
async fn first_contact_is_idempotent() {
    let db = new_test_db().await;
    let api = AccountApi::new(db.clone(), test_config());

    let user = api.register_contact(100, Some("alice_sells"), Some("Alice")).await.unwrap();
    assert_eq!(user.rating, 5.0);
    assert_eq!(user.total_deals, 0);
    assert!(!user.is_banned);
    assert!(!user.is_guarantor);

    // A repeat visit refreshes the display fields and touches nothing else.
    let user = api.register_contact(100, Some("alice_sells"), Some("Alicia")).await.unwrap();
    assert_eq!(user.first_name.as_deref(), Some("Alicia"));
    assert_eq!(user.rating, 5.0);
}

#[tokio::test]
async fn wallets_validate_and_soft_delete() {
    let db = new_test_db().await;
    let api = AccountApi::new(db.clone(), test_config());
    api.register_contact(100, None, Some("Alice")).await.unwrap();

    let err = api.add_wallet(100, WalletType::Card, "1234-what-5678").await.unwrap_err();
    assert!(matches!(err, WalletApiError::InvalidAddress(WalletValidationError::CardNotNumeric)), "{err}");

    // The stored address is the canonical form.
    let wallet = api.add_wallet(100, WalletType::Card, "1234 5678 9012 3456").await.unwrap();
    assert_eq!(wallet.wallet_address, "1234567890123456");
    assert!(wallet.is_active);

    let wallets = api.wallets(100).await.unwrap();
    assert_eq!(wallets.len(), 1);

    // Deactivated, not deleted: gone from the active list, still in the table.
    api.remove_wallet(100, wallet.id).await.unwrap();
    assert!(api.wallets(100).await.unwrap().is_empty());
    let err = api.remove_wallet(100, wallet.id).await.unwrap_err();
    assert!(matches!(err, WalletApiError::WalletNotFound(_)), "{err}");

    // Nobody can deactivate someone else's wallet.
    api.register_contact(200, None, Some("Bob")).await.unwrap();
    let bobs = api.add_wallet(200, WalletType::Ton, "EQDrjaLahLkMB-hMCmkzOyBuHJ139ZUYmPHu6RRBKnbdLIYI").await.unwrap();
    let err = api.remove_wallet(100, bobs.id).await.unwrap_err();
    assert!(matches!(err, WalletApiError::WalletNotFound(_)), "{err}");
}

#[tokio::test]
async fn admin_gates_hold() {
    let db = new_test_db().await;
    let api = AccountApi::new(db.clone(), test_config());
    api.register_contact(100, None, Some("Alice")).await.unwrap();
    api.register_contact(ADMIN_ID, None, Some("Root")).await.unwrap();

    // A regular user bounces off every administrative operation.
    for err in [
        api.set_banned(100, 100, true).await.unwrap_err(),
        api.set_guarantor(100, 100, true).await.unwrap_err(),
        api.add_scammer(100, 200, "because").await.unwrap_err(),
        api.set_maintenance_mode(100, true).await.unwrap_err(),
        api.recent_actions(100, 10).await.unwrap_err(),
        api.list_users(100).await.unwrap_err(),
    ] {
        assert!(matches!(err, AccountApiError::NotAuthorized(100)), "{err}");
    }

    // The administrator does not.
    api.set_guarantor(ADMIN_ID, 100, true).await.unwrap();
    assert!(db.fetch_user(100).await.unwrap().unwrap().is_guarantor);
    api.set_banned(ADMIN_ID, 100, true).await.unwrap();
    assert!(db.fetch_user(100).await.unwrap().unwrap().is_banned);

    api.add_scammer(ADMIN_ID, 100, "chargeback artist").await.unwrap();
    assert!(api.is_scammer(100).await.unwrap());
    let record = api.scammer_record(100).await.unwrap().unwrap();
    assert_eq!(record.reason, "chargeback artist");
    assert_eq!(record.added_by, ADMIN_ID);
    assert!(api.remove_scammer(ADMIN_ID, 100).await.unwrap());
    assert!(!api.is_scammer(100).await.unwrap());

    // Everything above left an audit trail.
    let actions: Vec<String> =
        api.recent_actions(ADMIN_ID, 50).await.unwrap().into_iter().map(|e| e.action).collect();
    for expected in ["guarantor_added", "user_banned", "scammer_added", "scammer_removed"] {
        assert!(actions.iter().any(|a| a == expected), "missing audit action {expected}: {actions:?}");
    }
}

#[tokio::test]
async fn maintenance_flag_round_trips() {
    let db = new_test_db().await;
    let api = AccountApi::new(db.clone(), test_config());
    api.register_contact(ADMIN_ID, None, Some("Root")).await.unwrap();

    assert!(!api.is_maintenance_mode().await.unwrap());
    api.set_maintenance_mode(ADMIN_ID, true).await.unwrap();
    assert!(api.is_maintenance_mode().await.unwrap());
    api.set_maintenance_mode(ADMIN_ID, false).await.unwrap();
    assert!(!api.is_maintenance_mode().await.unwrap());
}
