//! Guarantex Engine
//!
//! Guarantex is an escrow-deal engine for chat-platform marketplaces: a seller posts a deal, a
//! buyer attaches via a short shared code, a vetted guarantor mediates and signs off, and both
//! parties rate each other afterwards. This library contains the core logic — the deal state
//! machine, guarantor dispatch, deal threads and the reputation engine. It is transport-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@traits`] and the SQLite backend). You should never
//!    need to access the database directly; use the public API objects instead. The exception is
//!    the data types, which are defined in [`mod@db_types`] and are public.
//! 2. The engine public API ([`DealFlowApi`], [`GuarantorDispatch`], [`ThreadApi`],
//!    [`AccountApi`], [`RatingApi`]). Specific backends need to implement the traits in
//!    [`mod@traits`] to serve these APIs; [`SqliteDatabase`] is the provided one.
//!
//! The engine also emits events when deals move through their lifecycle. A simple actor
//! framework ([`mod@events`]) lets a bot layer hook into these events — for example to turn a
//! completed deal into chat notifications — without the engine knowing anything about the
//! transport.
pub mod config;
pub mod db_types;
pub mod events;
mod gx_api;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod reaper;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(all(feature = "sqlite", any(feature = "test_utils", test)))]
pub mod test_utils;

pub use config::EngineConfig;
pub use gx_api::{
    accounts_api::AccountApi,
    deal_flow_api::DealFlowApi,
    deal_objects,
    dispatch::GuarantorDispatch,
    rating_api::RatingApi,
    thread_api::ThreadApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
