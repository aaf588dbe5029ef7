//! Soko Payment Engine
//!
//! The order, escrow and wallet core of the Soko marketplace. HTTP handlers, auth and storefront
//! concerns live elsewhere; this library owns the money-bearing flows and their invariants:
//!
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You
//!    should never need to access the database directly; use the public APIs instead. The
//!    exception is the data types used in the database, which are defined in [`mod@db_types`] and
//!    are public.
//! 2. The engine's public API ([`mod@api`]): [`OrderFlowApi`] for checkout through escrow
//!    settlement, [`WalletApi`] for the ledger primitives, [`WithdrawalApi`] for payouts.
//!    Backends implement the traits in [`mod@traits`] to slot in underneath these APIs.
//!
//! The engine also provides a set of events that can be subscribed to ([`mod@events`]). Financial
//! flows publish an event after their transaction commits; notification delivery hangs off those
//! events and can never roll a payment back.
mod api;
pub mod cart;
pub mod config;
pub mod db_types;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{order_flow_api::OrderFlowApi, wallet_api::WalletApi, withdrawal_api::WithdrawalApi};
pub use config::PlatformConfig;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{MarketplaceDatabase, MarketplaceError, ProductCatalog, WalletApiError, WalletManagement};
