//! End-to-end lifecycle tests for the deal ledger: the happy path from `waiting_buyer` through
//! `completed`, the eligibility preconditions, and the authorization rules on completion and
//! cancellation.

mod support;

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use gtx_common::Money;
use guarantex_engine::{
    db_types::{Currency, DealStatus, MessageKind},
    events::{EventHandlers, EventHooks, EventProducers},
    traits::{DealLedgerError, UserManagement},
    DealFlowApi,
    RatingApi,
    ThreadApi,
};
use support::*;

const SELLER: i64 = 100;
const BUYER: i64 = 200;
const GUARANTOR: i64 = 300;

#[tokio::test]
async fn full_escrow_scenario() {
    let db = new_test_db().await;
    let config = test_config();
    seed_seller(&db, SELLER, "Alice").await;
    seed_user(&db, BUYER, "Bob").await;
    seed_guarantor(&db, GUARANTOR, "Grace").await;
    let api = DealFlowApi::new(db.clone(), config.clone(), EventProducers::default());

    // Seller opens a rouble deal.
    let amount: Money = "1500.00".parse().unwrap();
    let deal = api.create_deal(SELLER, Currency::Rub, amount, "laptop").await.unwrap();
    assert_eq!(deal.status, DealStatus::WaitingBuyer);
    assert_eq!(deal.seller_id, SELLER);
    assert_eq!(deal.buyer_id, None);
    assert_eq!(deal.amount, amount);
    assert_eq!(deal.deal_code.as_str().len(), config.code_length);
    assert_eq!(deal.commission_percent, config.commission_percent);
    assert!(!deal.guarantor_called);

    // Buyer joins with the shared code.
    let deal = api.join_deal(&deal.deal_code, BUYER).await.unwrap();
    assert_eq!(deal.status, DealStatus::WaitingGuarantor);
    assert_eq!(deal.buyer_id, Some(BUYER));

    // A guarantor accepts.
    let deal = api.assign_guarantor(deal.id, GUARANTOR).await.unwrap();
    assert_eq!(deal.status, DealStatus::InProgress);
    assert_eq!(deal.guarantor_id, Some(GUARANTOR));
    assert!(deal.started_at.is_some());

    // The guarantor signs the deal off.
    let deal = api.complete_deal(deal.id, GUARANTOR).await.unwrap();
    assert_eq!(deal.status, DealStatus::Completed);
    assert!(deal.completed_at.is_some());

    // Both participants' counters moved together with the status flip.
    for id in [SELLER, BUYER] {
        let user = db.fetch_user(id).await.unwrap().unwrap();
        assert_eq!(user.total_deals, 1, "user {id}");
        assert_eq!(user.completed_deals, 1, "user {id}");
    }
    let guarantor = db.fetch_user(GUARANTOR).await.unwrap().unwrap();
    assert_eq!(guarantor.total_deals, 0, "guarantors do not trade");

    // The thread carries the lifecycle system messages, closure included.
    let thread = ThreadApi::new(db.clone(), config.clone());
    let messages = thread.recent_messages(deal.id, SELLER).await.unwrap();
    let system_texts: Vec<&str> =
        messages.iter().filter(|m| m.kind == MessageKind::System).map(|m| m.message_text.as_str()).collect();
    assert_eq!(system_texts.len(), 3);
    assert!(system_texts[0].contains("joined the deal"));
    assert!(system_texts[1].contains("accepted the deal"));
    assert!(system_texts[2].contains("completed successfully"));

    // Mutual scoring: two ratings exist, but below the 3-rating threshold both aggregates stay
    // at the 5.0 default.
    let ratings = RatingApi::new(db.clone(), config.clone());
    ratings.rate(deal.id, BUYER, 5, None).await.unwrap();
    ratings.rate(deal.id, SELLER, 4, Some("slow to pay")).await.unwrap();
    assert_eq!(ratings.ratings_for_user(SELLER).await.unwrap().len(), 1);
    assert_eq!(ratings.ratings_for_user(BUYER).await.unwrap().len(), 1);
    for id in [SELLER, BUYER] {
        let user = db.fetch_user(id).await.unwrap().unwrap();
        assert_eq!(user.rating, 5.0, "user {id}");
    }

    // History shows the deal for every role.
    for id in [SELLER, BUYER, GUARANTOR] {
        let history = api.history_for_user(id).await.unwrap();
        assert_eq!(history.len(), 1, "user {id}");
        assert_eq!(history[0].deal.id, deal.id);
    }
    let stats = api.marketplace_stats().await.unwrap();
    assert_eq!(stats.completed_deals, 1);
    assert_eq!(stats.completed_volume, amount);
}

#[tokio::test]
async fn create_preconditions() {
    let db = new_test_db().await;
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    let amount = Money::from_major(100);

    // No wallet that can take a rouble payout.
    seed_user(&db, SELLER, "Alice").await;
    let err = api.create_deal(SELLER, Currency::Rub, amount, "laptop").await.unwrap_err();
    assert!(matches!(err, DealLedgerError::NoCompatibleWallet(Currency::Rub)), "{err}");

    seed_seller(&db, 101, "Anna").await;
    let err = api.create_deal(101, Currency::Rub, Money::from_major(0), "laptop").await.unwrap_err();
    assert!(matches!(err, DealLedgerError::InvalidAmount(_)), "{err}");
    let err = api.create_deal(101, Currency::Rub, Money::from_major(2_000_000), "laptop").await.unwrap_err();
    assert!(matches!(err, DealLedgerError::InvalidAmount(_)), "{err}");
    let err = api.create_deal(101, Currency::Rub, amount, "ab").await.unwrap_err();
    assert!(matches!(err, DealLedgerError::InvalidDescription(_)), "{err}");
    let err = api.create_deal(101, Currency::Rub, amount, &"x".repeat(201)).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::InvalidDescription(_)), "{err}");

    // One non-terminal deal per seller-or-buyer.
    api.create_deal(101, Currency::Rub, amount, "laptop").await.unwrap();
    let err = api.create_deal(101, Currency::Rub, amount, "another").await.unwrap_err();
    assert!(matches!(err, DealLedgerError::ActiveDealExists(101)), "{err}");

    // Banned and denylisted users are turned away.
    seed_seller(&db, 102, "Mallory").await;
    db.set_banned(102, true).await.unwrap();
    let err = api.create_deal(102, Currency::Rub, amount, "laptop").await.unwrap_err();
    assert!(matches!(err, DealLedgerError::UserBanned(102)), "{err}");

    seed_seller(&db, 103, "Sybil").await;
    db.add_scammer(103, "took the money and ran", ADMIN_ID).await.unwrap();
    let err = api.create_deal(103, Currency::Rub, amount, "laptop").await.unwrap_err();
    assert!(matches!(err, DealLedgerError::UserFlagged(103)), "{err}");
}

#[tokio::test]
async fn join_preconditions() {
    let db = new_test_db().await;
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    seed_seller(&db, SELLER, "Alice").await;
    seed_user(&db, BUYER, "Bob").await;
    let deal = api.create_deal(SELLER, Currency::Rub, Money::from_major(100), "laptop").await.unwrap();

    let err = api.join_deal(&"NOSUCH".parse().unwrap(), BUYER).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::DealNotFound(_)), "{err}");

    let err = api.join_deal(&deal.deal_code, SELLER).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::CannotJoinOwnDeal), "{err}");

    // Codes are case-insensitive on entry.
    let lower = deal.deal_code.as_str().to_lowercase().parse().unwrap();
    let joined = api.join_deal(&lower, BUYER).await.unwrap();
    assert_eq!(joined.id, deal.id);

    // The deal has moved on; a latecomer is told it is unavailable, not given an error dump.
    seed_user(&db, 201, "Carol").await;
    let err = api.join_deal(&deal.deal_code, 201).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::DealUnavailable), "{err}");

    // A buyer already in a deal cannot join another.
    seed_seller(&db, 104, "Dave").await;
    let other = api.create_deal(104, Currency::Rub, Money::from_major(50), "phone").await.unwrap();
    let err = api.join_deal(&other.deal_code, BUYER).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::ActiveDealExists(BUYER)), "{err}");
}

#[tokio::test]
async fn completion_authorization_and_terminality() {
    let db = new_test_db().await;
    let config = test_config();
    let api = DealFlowApi::new(db.clone(), config, EventProducers::default());
    seed_seller(&db, SELLER, "Alice").await;
    seed_user(&db, BUYER, "Bob").await;
    seed_guarantor(&db, GUARANTOR, "Grace").await;
    seed_user(&db, ADMIN_ID, "Root").await;

    let deal = api.create_deal(SELLER, Currency::Rub, Money::from_major(100), "laptop").await.unwrap();

    // Completion is meaningless before mediation starts.
    let err = api.complete_deal(deal.id, GUARANTOR).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::NotAuthorized { .. }), "{err}");

    let deal_joined = api.join_deal(&deal.deal_code, BUYER).await.unwrap();
    let deal_running = api.assign_guarantor(deal_joined.id, GUARANTOR).await.unwrap();

    // Neither trading party may complete.
    for id in [SELLER, BUYER] {
        let err = api.complete_deal(deal_running.id, id).await.unwrap_err();
        assert!(matches!(err, DealLedgerError::NotAuthorized { .. }), "user {id}: {err}");
    }

    // The administrator override works...
    let done = api.complete_deal(deal_running.id, ADMIN_ID).await.unwrap();
    assert_eq!(done.status, DealStatus::Completed);

    // ...but terminal is terminal, for the administrator too.
    let err = api.complete_deal(done.id, ADMIN_ID).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::AlreadyTerminal(DealStatus::Completed)), "{err}");
    let err = api.cancel_deal(done.id, ADMIN_ID).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::AlreadyTerminal(DealStatus::Completed)), "{err}");
}

#[tokio::test]
async fn any_participant_may_cancel_any_open_stage() {
    let db = new_test_db().await;
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    seed_seller(&db, SELLER, "Alice").await;
    seed_user(&db, BUYER, "Bob").await;
    seed_guarantor(&db, GUARANTOR, "Grace").await;

    // Seller cancels while still waiting for a buyer.
    let deal = api.create_deal(SELLER, Currency::Rub, Money::from_major(10), "cable").await.unwrap();
    let cancelled = api.cancel_deal(deal.id, SELLER).await.unwrap();
    assert_eq!(cancelled.status, DealStatus::Cancelled);
    assert!(!cancelled.guarantor_called);

    // Guarantor cancels a running deal; outsiders cannot.
    let deal = api.create_deal(SELLER, Currency::Rub, Money::from_major(10), "cable").await.unwrap();
    let deal = api.join_deal(&deal.deal_code, BUYER).await.unwrap();
    let deal = api.assign_guarantor(deal.id, GUARANTOR).await.unwrap();
    seed_user(&db, 777, "Eve").await;
    let err = api.cancel_deal(deal.id, 777).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::NotAParticipant { user_id: 777, .. }), "{err}");
    let cancelled = api.cancel_deal(deal.id, GUARANTOR).await.unwrap();
    assert_eq!(cancelled.status, DealStatus::Cancelled);

    // Cancellation never bumps the completion counters.
    let user = db.fetch_user(SELLER).await.unwrap().unwrap();
    assert_eq!(user.completed_deals, 0);
}

#[tokio::test]
async fn guarantor_restrictions() {
    let db = new_test_db().await;
    let api = DealFlowApi::new(db.clone(), test_config(), EventProducers::default());
    seed_seller(&db, SELLER, "Alice").await;
    seed_user(&db, BUYER, "Bob").await;
    seed_seller(&db, 104, "Dave").await;
    seed_user(&db, 204, "Carol").await;
    seed_guarantor(&db, GUARANTOR, "Grace").await;

    let first = api.create_deal(SELLER, Currency::Rub, Money::from_major(10), "cable").await.unwrap();
    let first = api.join_deal(&first.deal_code, BUYER).await.unwrap();
    let second = api.create_deal(104, Currency::Rub, Money::from_major(20), "mouse").await.unwrap();
    let second = api.join_deal(&second.deal_code, 204).await.unwrap();

    // Only flagged guarantors may accept.
    let err = api.assign_guarantor(first.id, BUYER).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::NotAGuarantor(BUYER)), "{err}");

    // One in-progress deal per guarantor.
    api.assign_guarantor(first.id, GUARANTOR).await.unwrap();
    let err = api.assign_guarantor(second.id, GUARANTOR).await.unwrap_err();
    assert!(matches!(err, DealLedgerError::GuarantorBusy(GUARANTOR)), "{err}");

    // Freed after completion.
    api.complete_deal(first.id, GUARANTOR).await.unwrap();
    let second = api.assign_guarantor(second.id, GUARANTOR).await.unwrap();
    assert_eq!(second.guarantor_id, Some(GUARANTOR));
}

#[tokio::test]
async fn lifecycle_hooks_fire() {
    let db = new_test_db().await;
    seed_seller(&db, SELLER, "Alice").await;
    seed_user(&db, BUYER, "Bob").await;
    seed_guarantor(&db, GUARANTOR, "Grace").await;

    let completions = Arc::new(AtomicU64::new(0));
    let seen = completions.clone();
    let mut hooks = EventHooks::default();
    hooks.on_deal_completed(move |event| {
        let seen = seen.clone();
        Box::pin(async move {
            assert_eq!(event.deal.status, DealStatus::Completed);
            seen.fetch_add(1, Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = DealFlowApi::new(db.clone(), test_config(), producers);
    let deal = api.create_deal(SELLER, Currency::Rub, Money::from_major(10), "cable").await.unwrap();
    let deal = api.join_deal(&deal.deal_code, BUYER).await.unwrap();
    let deal = api.assign_guarantor(deal.id, GUARANTOR).await.unwrap();
    api.complete_deal(deal.id, GUARANTOR).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}
