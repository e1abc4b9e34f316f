//! Order Engine
//!
//! The order engine processes purchase orders against a prepaid balance: it reserves stock, applies coupons, debits
//! the user's balance and persists the order, all as one atomic unit of work. Payment is settled asynchronously with
//! an external, unreliable payment processor.
//!
//! The library is divided into these main sections:
//! 1. Backend contracts ([`mod@traits`]) and their SQLite implementation ([`SqliteDatabase`]). You should not normally
//!    need to access the database directly. The data types used by the backends are public, in [`mod@db_types`].
//! 2. The payment processor client ([`mod@gateway`]), with per-attempt timeouts, bounded retry and a circuit breaker.
//! 3. The public API ([`OrderFlowApi`], [`PaymentFlowApi`] and [`AccountApi`]).
//!
//! The engine also publishes events ([`mod@events`]) when payments settle and orders change state. Confirming or
//! cancelling an order after its payment settles is itself implemented as a set of event hooks
//! ([`settlement_hooks`]).
pub mod db_types;
pub mod events;
pub mod gateway;
mod order_api;
pub mod pricing;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use order_api::settlement::settlement_hooks;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use order_api::{
    accounts_api::{AccountApi, PointsSummary},
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::PaymentFlowApi,
    payment_objects,
};
pub use traits::{AccountManagement, CatalogManagement, OrderError, OrderManagement, PaymentManagement};
