//! Shared fixtures: a throwaway SQLite file, seeded users and equipment.

use std::sync::OnceLock;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::auth::{hash_password, issue_token};
use crate::config::{AppConfig, Environment};
use crate::state::AppState;
use crate::store::{
    equipment,
    users::{self, NewUser},
};
use crate::types::{CreateEquipmentRequest, Equipment, Role, User};

pub struct TestDb {
    pub pool: SqlitePool,
    // Dropping the dir deletes the database file
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("agrirent-test.db").display());
    let pool = crate::db::connect_pool(&url, 4).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();
    TestDb { pool, _dir: dir }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.server.environment = Environment::Test;
    cfg
}

/// Argon2 hash of `secret1`, computed once per test binary.
fn secret1_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password("secret1").unwrap()).clone()
}

pub async fn create_user(pool: &SqlitePool, email: &str, role: Role) -> User {
    let new = NewUser { name: "Test User", email, phone: None, role, password_hash: secret1_hash() };
    users::insert(pool, new, Utc::now()).await.unwrap()
}

pub async fn create_equipment(pool: &SqlitePool, owner: &User, name: &str, price_per_day: f64) -> Equipment {
    let req = CreateEquipmentRequest {
        name: name.to_string(),
        description: format!("{} in good condition", name),
        category: "Tractor".to_string(),
        location: "Pune".to_string(),
        price_per_day,
        image_url: None,
    };
    equipment::insert(pool, owner.id, &req, Utc::now()).await.unwrap()
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}

/// Router plus state over a fresh database.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    _db: TestDb,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = test_db().await;
        let state = AppState::new(db.pool.clone(), test_config());
        let app = crate::routes::build_app(state.clone());
        TestApp { app, state, _db: db }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    pub fn token_for(&self, user: &User) -> String {
        issue_token(&self.state.config.auth, user).unwrap()
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    /// Sends a request and returns the status with the parsed JSON body (`Null` if empty).
    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (u16, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = self.send(req).await;
        let status = res.status().as_u16();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            // Bodies from outer layers may be plain text
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}
