#[cfg(test)]
mod tests {
    use crate::config::{self, AppConfig, Environment};
    use std::env;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Tests that touch process environment must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn write_temp_config(content: &str) -> NamedTempFile {
        let temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        fs::write(temp_file.path(), content).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.database.url, "sqlite://data/agrirent.db");
        assert_eq!(config.holds.hold_minutes, 15);
        assert_eq!(config.holds.sweep_interval_secs, 60);
        assert_eq!(config.holds.max_rental_days, 90);
        assert!(config.admin.password.is_none());
        assert!(config.security.is_none());
    }

    #[test]
    fn test_allowed_origins_follow_environment() {
        let mut config = AppConfig::default();
        assert!(config.allowed_origins().contains(&"http://localhost:3000".to_string()));
        config.server.environment = Environment::Production;
        assert!(config.allowed_origins().iter().all(|o| o.starts_with("https://")));
    }

    #[test]
    fn test_valid_config_does_not_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        assert!(config::load().is_ok());
    }

    #[test]
    fn test_invalid_server_port() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("AGRIRENT__SERVER__PORT", "0");
        let result = config::load();
        env::remove_var("AGRIRENT__SERVER__PORT");
        assert!(result.unwrap_err().to_string().contains("invalid server.port"));
    }

    #[test]
    fn test_config_from_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("AGRIRENT__SERVER__HOST", "127.0.0.1");
        env::set_var("AGRIRENT__HOLDS__HOLD_MINUTES", "30");
        env::set_var("AGRIRENT__DATABASE__URL", "sqlite://test.db");

        let result = config::load();

        env::remove_var("AGRIRENT__SERVER__HOST");
        env::remove_var("AGRIRENT__HOLDS__HOLD_MINUTES");
        env::remove_var("AGRIRENT__DATABASE__URL");

        let config = result.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.holds.hold_minutes, 30);
        assert_eq!(config.database.url, "sqlite://test.db");
    }

    #[test]
    fn test_port_variable_overrides_everything() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        env::set_var("AGRIRENT__SERVER__PORT", "9000");
        env::set_var("PORT", "10000");
        let result = config::load();
        env::remove_var("AGRIRENT__SERVER__PORT");
        env::remove_var("PORT");
        assert_eq!(result.unwrap().server.port, 10000);
    }

    #[test]
    fn test_config_file_then_env_priority() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp_file = write_temp_config(
            r#"
[server]
port = 7000

[holds]
hold_minutes = 5
max_rental_days = 30

[admin]
password = "from-file"
"#,
        );
        env::set_var("AGRIRENT_CONFIG", temp_file.path().to_str().unwrap());
        env::set_var("AGRIRENT__SERVER__PORT", "8888");

        let result = config::load();

        env::remove_var("AGRIRENT_CONFIG");
        env::remove_var("AGRIRENT__SERVER__PORT");

        let config = result.unwrap();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.holds.hold_minutes, 5);
        assert_eq!(config.holds.max_rental_days, 30);
        assert_eq!(config.holds.sweep_interval_secs, 60);
        assert_eq!(config.admin.password.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.holds.hold_minutes = 0;
        assert!(config::validate(&config).unwrap_err().to_string().contains("holds.hold_minutes"));

        let mut config = AppConfig::default();
        config.holds.sweep_interval_secs = 0;
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config::validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_durations() {
        let mut config = AppConfig::default();
        config.auth.token_ttl_secs = u64::MAX;
        assert!(config::validate(&config).unwrap_err().to_string().contains("auth.token_ttl_secs"));

        let mut config = AppConfig::default();
        config.holds.hold_minutes = i64::MAX;
        assert!(config::validate(&config).unwrap_err().to_string().contains("holds.hold_minutes"));

        let mut config = AppConfig::default();
        config.holds.sweep_interval_secs = u64::MAX;
        assert!(config::validate(&config).is_err());

        let mut config = AppConfig::default();
        config.holds.max_rental_days = 100_000;
        assert!(config::validate(&config).unwrap_err().to_string().contains("holds.max_rental_days"));

        let mut config = AppConfig::default();
        config.holds.hold_minutes = 24 * 60;
        config.auth.token_ttl_secs = 365 * 24 * 60 * 60;
        assert!(config::validate(&config).is_ok());
    }

    #[test]
    fn test_production_requires_long_secret() {
        let mut config = AppConfig::default();
        config.server.environment = Environment::Production;
        assert!(config::validate(&config).unwrap_err().to_string().contains("jwt_secret"));

        config.auth.jwt_secret = "x".repeat(32);
        assert!(config::validate(&config).is_ok());
    }

    #[test]
    fn test_ensure_sqlite_parent_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("subdir/test.db");
        let db_url = format!("sqlite://{}", db_path.display());

        assert!(!db_path.parent().unwrap().exists());
        config::ensure_sqlite_parent_dir(&db_url).unwrap();
        assert!(db_path.parent().unwrap().exists());
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_non_sqlite() {
        assert!(config::ensure_sqlite_parent_dir("postgres://localhost/db").is_ok());
    }
}
