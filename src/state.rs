use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::payment::{PaymentGateway, ReferenceGateway};

/// The shared application state.
///
/// Cloned into every handler by Axum; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Booking lifecycle counters, shared with the expiry sweep.
    pub metrics: Metrics,
    /// Charges payment holds on confirmation.
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Creates the state with the built-in reference payment gateway.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        Self::with_gateway(db, config, Arc::new(ReferenceGateway))
    }

    pub fn with_gateway(db: sqlx::SqlitePool, config: AppConfig, payments: Arc<dyn PaymentGateway>) -> Self {
        Self { db, config: Arc::new(config), metrics: Metrics::new(), payments }
    }

    pub fn hold_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.config.holds.hold_minutes)
    }
}
