use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
}

fn default_max_connections() -> u32 { 5 }

fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "carpool_booking=info,carpool_ledger=info,carpool_store=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `CARPOOL_DATABASE__URL=postgres://...` sets `database.url`
            .add_source(
                config::Environment::with_prefix("CARPOOL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml_str(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = Config::from_toml_str(
            r#"
            [store]
            backend = "memory"
            "#,
        )
        .expect("Failed to parse config");

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(!config.store.run_migrations);
        assert!(config.database.is_none());
        assert!(config.logging.filter.contains("carpool_booking=info"));
    }

    #[test]
    fn test_postgres_section() {
        let config = Config::from_toml_str(
            r#"
            [store]
            backend = "postgres"
            run_migrations = true

            [database]
            url = "postgres://carpool@localhost/carpool"
            max_connections = 12
            "#,
        )
        .expect("Failed to parse config");

        let database = config.database.unwrap();
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(database.max_connections, 12);
        assert_eq!(database.acquire_timeout_seconds, 3);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Config::from_toml_str("[store]\nbackend = \"redis\"\n");
        assert!(result.is_err());
    }
}
