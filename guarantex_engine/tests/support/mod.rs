//! Shared scaffolding for the integration tests: throwaway file-backed databases, seeded
//! identities, and canned notification/archive sinks.
//!
//! The databases are real files under the system temp directory rather than `sqlite::memory:`;
//! with an in-memory database every pool connection gets its own empty store, which would
//! defeat the cross-task race tests.
#![allow(dead_code)]

use std::sync::Mutex;

use guarantex_engine::{
    db_types::{User, WalletType},
    traits::{
        ArchiveError,
        MessageRef,
        NotificationSink,
        NotifyAction,
        NotifyError,
        TranscriptArchive,
        UserManagement,
        WalletManagement,
    },
    EngineConfig,
    SqliteDatabase,
};

pub const ADMIN_ID: i64 = 999;

pub fn test_config() -> EngineConfig {
    EngineConfig { admin_id: ADMIN_ID, ..Default::default() }
}

pub async fn new_test_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = format!(
        "sqlite://{}/guarantex_test_{}.db?mode=rwc",
        std::env::temp_dir().display(),
        rand::random::<u64>()
    );
    let db = SqliteDatabase::new_with_url(&url, 8).await.expect("Error creating database");
    db.migrate().await.expect("Error running migrations");
    db
}

pub async fn seed_user(db: &SqliteDatabase, id: i64, name: &str) -> User {
    db.upsert_user(id, None, Some(name)).await.expect("Error seeding user")
}

/// A user with a card wallet, ready to open rouble deals.
pub async fn seed_seller(db: &SqliteDatabase, id: i64, name: &str) -> User {
    let user = seed_user(db, id, name).await;
    db.insert_wallet(guarantex_engine::db_types::NewWallet {
        user_id: id,
        wallet_type: WalletType::Card,
        wallet_address: "1234567890123456".to_string(),
    })
    .await
    .expect("Error seeding wallet");
    user
}

pub async fn seed_guarantor(db: &SqliteDatabase, id: i64, name: &str) -> User {
    let user = seed_user(db, id, name).await;
    db.set_guarantor(id, true).await.expect("Error flagging guarantor");
    user
}

/// Records every send; optionally refuses them all.
#[derive(Default)]
pub struct RecordingSink {
    pub refuse: bool,
    pub sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingSink {
    pub fn refusing() -> Self {
        Self { refuse: true, sent: Mutex::new(Vec::new()) }
    }

    pub fn recipients(&self) -> Vec<i64> {
        self.sent.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

impl NotificationSink for &RecordingSink {
    async fn send(&self, user_id: i64, text: &str, _actions: &[NotifyAction]) -> Result<MessageRef, NotifyError> {
        if self.refuse {
            return Err(NotifyError("transport said no".to_string()));
        }
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        Ok(MessageRef { chat_id: user_id, message_id: self.sent.lock().unwrap().len() as i64 })
    }

    async fn edit(&self, _message: &MessageRef, _text: &str, _actions: &[NotifyAction]) -> Result<(), NotifyError> {
        Ok(())
    }
}

pub struct StubArchive {
    pub fail: bool,
}

impl TranscriptArchive for StubArchive {
    async fn upload(&self, _text: &str, title: &str) -> Result<String, ArchiveError> {
        if self.fail {
            Err(ArchiveError("archive offline".to_string()))
        } else {
            Ok(format!("https://paste.example/{}", title.replace(' ', "_")))
        }
    }
}
