//! Capability traits for Guarantex storage backends, plus the outward-facing collaborator
//! boundaries (notification sink, transcript archive).
//!
//! Backends implement the storage traits with *single-row conditional updates*: every race the
//! engine has to arbitrate (buyer join, guarantor accept, double completion) is decided by a
//! `WHERE`-guarded write at the storage layer, never by an in-process lock.

mod account_management;
mod data_objects;
mod deal_ledger;
mod notification;
mod rating_management;
mod thread_management;
mod wallet_management;

pub use account_management::{AccountApiError, SettingsManagement, UserManagement};
pub use data_objects::{ChatSummary, DealHistoryEntry, DispatchReport, MarketplaceStats, MessageHit};
pub use deal_ledger::{DealLedgerDatabase, DealLedgerError};
pub use notification::{
    ArchiveError,
    MessageRef,
    NotificationSink,
    NotifyAction,
    NotifyError,
    TranscriptArchive,
};
pub use rating_management::{RatingApiError, RatingManagement};
pub use thread_management::{ThreadApiError, ThreadManagement};
pub use wallet_management::{WalletApiError, WalletManagement};
