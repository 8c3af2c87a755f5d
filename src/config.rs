use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub development_origins: Vec<String>,
    pub production_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
}

/// Payment-hold lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HoldsConfig {
    /// How long a fresh hold blocks the equipment before the sweep may expire it.
    pub hold_minutes: i64,
    pub sweep_interval_secs: u64,
    pub max_rental_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub name: String,
    pub email: String,
    /// Seeding is skipped when no password is configured.
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticFilesConfig {
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub holds: HoldsConfig,
    pub admin: AdminConfig,
    pub static_files: StaticFilesConfig,
    pub security: Option<SecurityConfig>,
}

impl AppConfig {
    /// Origins allowed by CORS for the configured environment.
    pub fn allowed_origins(&self) -> &[String] {
        if self.server.environment.is_production() {
            &self.cors.production_origins
        } else {
            &self.cors.development_origins
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        let defaults: &str = include_str!("../config/default.toml");
        match ::config::Config::builder()
            .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
            .build()
            .and_then(|cfg| cfg.try_deserialize())
        {
            Ok(app_cfg) => app_cfg,
            Err(e) => panic!("embedded default config is invalid: {}", e),
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let defaults: &str = include_str!("../config/default.toml");
    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(defaults, ::config::FileFormat::Toml))
        .add_source(::config::File::with_name("agrirent").required(false));

    if let Ok(custom_path) = std::env::var("AGRIRENT_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("AGRIRENT").separator("__"));

    // Hosting platforms hand out the listen port via PORT
    if let Ok(port) = std::env::var("PORT") {
        builder = builder.set_override("server.port", port)?;
    }

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const MAX_HOLD_MINUTES: i64 = 24 * 60;
const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_RENTAL_DAYS: i64 = 3650;

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    if cfg.auth.jwt_secret.is_empty() {
        return Err(anyhow::anyhow!("auth.jwt_secret must not be empty"));
    }
    if cfg.server.environment.is_production() && cfg.auth.jwt_secret.len() < 32 {
        return Err(anyhow::anyhow!("auth.jwt_secret must be at least 32 bytes in production"));
    }
    if cfg.auth.token_ttl_secs == 0 || cfg.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
        return Err(anyhow::anyhow!("auth.token_ttl_secs must be between 1 and {}", MAX_TOKEN_TTL_SECS));
    }

    if !(1..=MAX_HOLD_MINUTES).contains(&cfg.holds.hold_minutes) {
        return Err(anyhow::anyhow!("holds.hold_minutes must be between 1 and {}", MAX_HOLD_MINUTES));
    }
    if cfg.holds.sweep_interval_secs == 0 || cfg.holds.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
        return Err(anyhow::anyhow!(
            "holds.sweep_interval_secs must be between 1 and {}",
            MAX_SWEEP_INTERVAL_SECS
        ));
    }
    if !(1..=MAX_RENTAL_DAYS).contains(&cfg.holds.max_rental_days) {
        return Err(anyhow::anyhow!("holds.max_rental_days must be between 1 and {}", MAX_RENTAL_DAYS));
    }

    if cfg.allowed_origins().is_empty() {
        tracing::warn!("No CORS origins configured for {}", cfg.server.environment.as_str());
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
