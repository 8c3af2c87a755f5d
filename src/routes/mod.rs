//! HTTP route handlers for the AgriRent API.
//!
//! - `auth`: registration, login and the current user
//! - `bookings`: payment holds and the booking lifecycle
//! - `equipment`: equipment listings and their calendars
//! - `health`: liveness, readiness, metrics and service info
//! - `users`: account management

pub mod auth;
pub mod bookings;
pub mod equipment;
pub mod health;
pub mod users;

use std::path::PathBuf;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::middleware;
use crate::state::AppState;

/// All API and probe routes, without cross-cutting layers.
pub fn api_router(state: AppState) -> Router {
    let auth = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let users = Router::new()
        .route("/", get(users::list_users))
        .route("/{id}", get(users::get_user).put(users::update_user).delete(users::delete_user));

    let equipment = Router::new()
        .route("/", get(equipment::list_equipment).post(equipment::create_equipment))
        .route("/categories", get(equipment::categories))
        .route("/locations", get(equipment::locations))
        .route(
            "/{id}",
            get(equipment::get_equipment).put(equipment::update_equipment).delete(equipment::delete_equipment),
        )
        .route("/{id}/unavailable-dates", get(equipment::unavailable_dates));

    let bookings = Router::new()
        .route("/", get(bookings::list_bookings))
        .route("/payment-hold", post(bookings::create_payment_hold))
        .route("/availability/{equipment_id}", get(bookings::availability))
        .route("/{id}", get(bookings::get_booking))
        .route("/{id}/confirm-payment", post(bookings::confirm_payment))
        .route("/{id}/fail-payment", post(bookings::fail_payment))
        .route("/{id}/cancel-payment", post(bookings::cancel_payment))
        .route("/{id}/accept", post(bookings::accept))
        .route("/{id}/reject", post(bookings::reject))
        .route("/{id}/complete", post(bookings::complete))
        .route("/{id}/cancel-dates", post(bookings::cancel_dates));

    Router::new()
        .route("/health", get(health::health))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/api", get(health::api_info))
        .nest("/api/auth", auth)
        .nest("/api/users", users)
        .nest("/api/equipment", equipment)
        .nest("/api/bookings2", bookings)
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins()
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// The full application: routes, the production SPA fallback and every middleware layer.
pub fn build_app(state: AppState) -> Router {
    let cfg = state.config.clone();
    let cors = cors_layer(&state);
    let mut app = api_router(state);

    if cfg.server.environment.is_production() {
        let root = PathBuf::from(&cfg.static_files.dir);
        let index = root.join("index.html");
        if root.is_dir() && index.is_file() {
            tracing::info!("serving frontend from {}", root.display());
            let spa = ServeDir::new(root).append_index_html_on_directories(true).not_found_service(ServeFile::new(index));
            app = app.fallback_service(spa);
        } else {
            tracing::warn!("static_files.dir {} not found, frontend disabled", root.display());
        }
    }

    app
        // Global body limit (1 MB)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
}
