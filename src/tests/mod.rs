//! Integration and unit tests for the AgriRent backend.
//!
//! ## Test Modules
//!
//! - **lifecycle_tests**: the booking state machine and its authorization table
//! - **store_tests**: holds, overlap checks and conditional transitions against SQLite
//! - **sweep_tests**: hold expiry, including the race with payment confirmation
//! - **api_tests**: HTTP endpoints end to end through the router
//! - **health_api_tests**: health, readiness, metrics and response headers
//! - **auth_tests**: password hashing and bearer tokens
//! - **error_tests**: error mapping and validation helpers
//! - **config_tests**: configuration loading and validation
//! - **db_tests**: schema initialization and admin seeding
//!
//! Individual modules can be run with e.g. `cargo test sweep_tests`.

pub mod support;

pub mod config_tests;
pub mod lifecycle_tests;
pub mod sweep_tests;
