//! # AgriRent Backend Library
//!
//! Core library for AgriRent, an agricultural equipment rental service. Owners list
//! equipment, renters place short-lived payment holds on date ranges, and a background
//! sweep reclaims holds that were never paid.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **SQLx**: asynchronous SQLite access
//! - **Tokio**: async runtime and the expiry sweep timer
//! - **Serde**: JSON request and response bodies
//!
//! ## Core Components
//!
//! - [`config`]: layered application configuration
//! - [`db`]: pool setup and schema initialization
//! - [`error`]: centralized error handling and HTTP error responses
//! - [`extract`]: request extractors that reject with the error envelope
//! - [`lifecycle`]: the booking / payment-hold state machine
//! - [`payment`]: the payment gateway seam and the confirm flow
//! - [`store`]: SQL access and the conditional updates behind every transition
//! - [`sweeper`]: periodic expiry of unpaid holds
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: shared application state

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod lifecycle;
pub mod metrics;
pub mod middleware;
pub mod payment;
pub mod routes;
pub mod state;
pub mod store;
pub mod sweeper;
pub mod types;

#[cfg(test)]
mod tests;
