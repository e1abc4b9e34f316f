//! #  Database management and control.
//!
//! This module provides the interfaces that define the interface contracts of the order engine database *backends*.
//!
//! ## Traits
//! * [`OrderManagement`] defines the highest level of behavior for backends: creating orders as a single atomic unit
//!   of work (stock reservation, coupon consumption, balance debit), and the confirm / cancel transitions of the order
//!   state machine, including compensation on cancel.
//! * [`PaymentManagement`] tracks payments against orders. Every status transition is a conditional update from
//!   `PENDING`, so terminal states are sticky.
//! * [`CatalogManagement`] is the narrow slice of the product catalog and coupon store that the order flow needs.
//! * [`AccountManagement`] covers users, their prepaid balances and the balance history.
//!
//! All methods return [`OrderError`], whose variants make up the error taxonomy exposed by the engine.
mod account_management;
mod catalog_management;
mod order_management;
mod payment_management;

pub use account_management::AccountManagement;
pub use catalog_management::CatalogManagement;
pub use order_management::{OrderError, OrderManagement};
pub use payment_management::PaymentManagement;
