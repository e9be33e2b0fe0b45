use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Where prompts and dimensions are read from.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    /// In-process catalog, optionally loaded from a JSON seed file.
    Memory { seed_path: Option<PathBuf> },
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so parsing can be exercised
    /// without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = lookup("STORAGE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let storage = match backend.trim().to_ascii_lowercase().as_str() {
            "postgres" => StorageBackend::Postgres {
                database_url: lookup("DATABASE_URL").context(
                    "Required environment variable 'DATABASE_URL' is not set",
                )?,
            },
            "memory" => StorageBackend::Memory {
                seed_path: lookup("SEED_FILE").map(PathBuf::from),
            },
            other => bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        Ok(Config {
            storage,
            max_connections: lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".to_string())
                .parse::<u32>()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            acquire_timeout: Duration::from_secs(
                lookup("DB_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse::<u64>()
                    .context("DB_ACQUIRE_TIMEOUT_SECS must be a number of seconds")?,
            ),
            port: lookup("PORT")
                .unwrap_or_else(|| "5000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_postgres_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/catalog")]).unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::Postgres {
                database_url: "postgres://localhost/catalog".to_string()
            }
        );
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert_eq!(config.port, 5000);
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(config_from(&[]).is_err());
    }

    #[test]
    fn test_memory_backend_with_seed() {
        let config = config_from(&[
            ("STORAGE_BACKEND", "Memory"),
            ("SEED_FILE", "/tmp/seed.json"),
            ("PORT", "8081"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::Memory {
                seed_path: Some(PathBuf::from("/tmp/seed.json"))
            }
        );
        assert_eq!(config.port, 8081);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(config_from(&[("STORAGE_BACKEND", "redis")]).is_err());
    }

    #[test]
    fn test_rejects_bad_pool_size() {
        let result = config_from(&[
            ("DATABASE_URL", "postgres://localhost/catalog"),
            ("DB_MAX_CONNECTIONS", "lots"),
        ]);
        assert!(result.is_err());
    }
}
