//! The engine's public API surface.
//!
//! Each API object wraps a storage backend generic and owns one concern: deal lifecycle
//! ([`deal_flow_api::DealFlowApi`]), guarantor summoning ([`dispatch::GuarantorDispatch`]),
//! the deal thread ([`thread_api::ThreadApi`]), identity and wallets
//! ([`accounts_api::AccountApi`]) and mutual scoring ([`rating_api::RatingApi`]).

pub mod accounts_api;
pub mod deal_flow_api;
pub mod deal_objects;
pub mod dispatch;
pub mod rating_api;
pub mod thread_api;
