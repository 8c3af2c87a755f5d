//! Middleware and extractors for HTTP request processing.
//!
//! - `auth`: the bearer-token [`auth::AuthUser`] extractor
//! - `security_headers`: response hardening and caching policy

pub mod auth;
pub mod security_headers;
