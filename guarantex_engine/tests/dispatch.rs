//! Guarantor dispatch: eligibility filtering, the one-shot call latch, and best-effort fan-out
//! with rollback when a round reaches nobody.

mod support;

use gtx_common::Money;
use guarantex_engine::{
    db_types::Currency,
    events::EventProducers,
    traits::{DealLedgerError, UserManagement},
    DealFlowApi,
    GuarantorDispatch,
};
use support::*;

const SELLER: i64 = 100;
const BUYER: i64 = 200;

async fn deal_awaiting_guarantor(db: &guarantex_engine::SqliteDatabase) -> guarantex_engine::db_types::Deal {
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    seed_seller(db, SELLER, "Alice").await;
    seed_user(db, BUYER, "Bob").await;
    let deal = api.create_deal(SELLER, Currency::Rub, Money::from_major(100), "laptop").await.unwrap();
    api.join_deal(&deal.deal_code, BUYER).await.unwrap()
}

#[tokio::test]
async fn dispatch_reaches_free_guarantors_only() {
    let db = new_test_db().await;
    let deal = deal_awaiting_guarantor(&db).await;
    seed_guarantor(&db, 301, "G1").await;
    seed_guarantor(&db, 302, "G2").await;
    // 303 is busy mediating another deal.
    seed_guarantor(&db, 303, "G3").await;
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    seed_seller(&db, 104, "Dave").await;
    seed_user(&db, 204, "Carol").await;
    let busy_deal = api.create_deal(104, Currency::Rub, Money::from_major(10), "mouse").await.unwrap();
    let busy_deal = api.join_deal(&busy_deal.deal_code, 204).await.unwrap();
    api.assign_guarantor(busy_deal.id, 303).await.unwrap();
    // 304 is banned and never hears anything.
    seed_guarantor(&db, 304, "G4").await;
    db.set_banned(304, true).await.unwrap();

    let sink = RecordingSink::default();
    let dispatch = GuarantorDispatch::new(db.clone(), &sink, test_config());
    let report = dispatch.call_guarantor(deal.id, SELLER).await.unwrap();
    assert_eq!(report.notified, 2);
    assert_eq!(report.skipped_busy, 1);
    assert_eq!(report.failed, 0);
    assert!(report.reached_anyone());

    let mut recipients = sink.recipients();
    recipients.sort_unstable();
    assert_eq!(recipients, vec![301, 302]);
    let sent = sink.sent.lock().unwrap();
    let summons = &sent[0].1;
    assert!(summons.contains(deal.deal_code.as_str()), "summons must carry the deal code: {summons}");
    drop(sent);

    // The latch is set and a repeat call bounces.
    let stored = api.deal_by_id(deal.id).await.unwrap().unwrap();
    assert!(stored.guarantor_called);
    let err = dispatch.call_guarantor(deal.id, BUYER).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::GuarantorAlreadyCalled), "{err}");
}

#[tokio::test]
async fn failed_round_resets_the_latch() {
    let db = new_test_db().await;
    let deal = deal_awaiting_guarantor(&db).await;
    seed_guarantor(&db, 301, "G1").await;

    let sink = RecordingSink::refusing();
    let dispatch = GuarantorDispatch::new(db.clone(), &sink, test_config());
    let report = dispatch.call_guarantor(deal.id, SELLER).await.unwrap();
    assert_eq!(report.notified, 0);
    assert_eq!(report.failed, 1);
    assert!(!report.reached_anyone());

    // The latch rolled back, so the parties may summon again.
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    let stored = api.deal_by_id(deal.id).await.unwrap().unwrap();
    assert!(!stored.guarantor_called);
    let report = dispatch.call_guarantor(deal.id, SELLER).await.unwrap();
    assert_eq!(report.failed, 1, "retry went through the whole round again: {report:?}");
}

#[tokio::test]
async fn no_guarantors_at_all_resets_the_latch() {
    let db = new_test_db().await;
    let deal = deal_awaiting_guarantor(&db).await;

    let sink = RecordingSink::default();
    let dispatch = GuarantorDispatch::new(db.clone(), &sink, test_config());
    let report = dispatch.call_guarantor(deal.id, SELLER).await.unwrap();
    assert!(!report.reached_anyone());
    assert_eq!(report.skipped_busy, 0);

    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    let stored = api.deal_by_id(deal.id).await.unwrap().unwrap();
    assert!(!stored.guarantor_called);
}

#[tokio::test]
async fn dispatch_gates() {
    let db = new_test_db().await;
    let sink = RecordingSink::default();
    let dispatch = GuarantorDispatch::new(db.clone(), &sink, test_config());
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());

    // Wrong status: still waiting for a buyer.
    seed_seller(&db, SELLER, "Alice").await;
    let deal = api.create_deal(SELLER, Currency::Rub, Money::from_major(10), "cable").await.unwrap();
    let err = dispatch.call_guarantor(deal.id, SELLER).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::DealUnavailable), "{err}");

    // Outsiders may not summon.
    seed_user(&db, BUYER, "Bob").await;
    let deal = api.join_deal(&deal.deal_code, BUYER).await.unwrap();
    seed_user(&db, 777, "Eve").await;
    let err = dispatch.call_guarantor(deal.id, 777).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::NotAParticipant { user_id: 777, .. }), "{err}");

    // Unknown deal.
    let err = dispatch.call_guarantor(99_999, SELLER).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::DealIdNotFound(99_999)), "{err}");
}
