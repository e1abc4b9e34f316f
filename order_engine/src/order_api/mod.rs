//! # Order engine public API
//!
//! The engine's functionality is split over a few small APIs, each generic over the backend traits it needs:
//!
//! * [`accounts_api`] manages users and their prepaid point balances.
//! * [`order_flow_api`] drives the order state machine: create, confirm, cancel, archive, and the payment timeout
//!   sweep.
//! * [`payment_flow_api`] talks to the payment processor: it requests payments for new and existing orders, and
//!   applies the processor's callbacks.
//! * [`settlement`] provides the event hooks that confirm or cancel an order once its payment is decided.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API requires.
//!
//! ```rust,ignore
//! use order_engine::{AccountApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/orders.db", 5).await?;
//! let api = AccountApi::new(db);
//! let points = api.points(user_id).await?;
//! ```
pub mod accounts_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payment_flow_api;
pub mod payment_objects;
#[cfg(feature = "sqlite")]
pub mod settlement;
