//! # Order server
//! The HTTP front end of the order engine. It is responsible for:
//! * Accepting orders and order state changes from users, identified by the `X-USER-ID` header.
//! * Requesting payment from the external payment processor, and receiving its callbacks.
//! * Charging and reporting point balances.
//! * Running the payment timeout sweep in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/v1/orders`: Create orders (`POST`) and list the caller's orders (`GET`).
//! * `/api/v1/orders/{id}`: An order with its lines and payments. `/confirm` and `/cancel` change its state.
//! * `/api/v1/payments`: Pay an existing order. `/api/v1/payments/callback` receives processor callbacks.
//! * `/api/v1/points`: The caller's balance and history. `/api/v1/points/charge` tops it up.
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod payment_timeout_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
