//! Database connection pool management
//!
//! Unified deadpool-postgres pool creation and configuration.

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use thiserror::Error;
use tokio_postgres::NoTls;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbPoolError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[from] tokio_postgres::Error),

    #[error("pool build failure: {0}")]
    Build(String),
}

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Service name for log labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections
    pub max_connections: usize,
    /// Connection creation timeout (new connection to PostgreSQL)
    pub connect_timeout_secs: u64,
    /// Connection acquisition timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 16,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl DbConfig {
    /// Build a DbConfig from environment variables, falling back to defaults.
    pub fn from_env(service_name: &str) -> Self {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
            max_connections: env_parse("DB_MAX_CONNECTIONS", defaults.max_connections),
            connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT_SECS", defaults.connect_timeout_secs),
            acquire_timeout_secs: env_parse("DB_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout_secs),
        }
    }

    pub fn log_config(&self) {
        info!(
            service = %self.service_name,
            max_connections = self.max_connections,
            connect_timeout_secs = self.connect_timeout_secs,
            acquire_timeout_secs = self.acquire_timeout_secs,
            "database pool configuration"
        );
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Create a deadpool-postgres pool from the given configuration.
pub async fn create_pool(cfg: DbConfig) -> Result<Pool, DbPoolError> {
    let pg_config: tokio_postgres::Config = cfg.database_url.parse()?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    let pool = Pool::builder(manager)
        .max_size(cfg.max_connections)
        .create_timeout(Some(Duration::from_secs(cfg.connect_timeout_secs)))
        .wait_timeout(Some(Duration::from_secs(cfg.acquire_timeout_secs)))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| DbPoolError::Build(e.to_string()))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_limits() {
        let cfg = DbConfig::default();
        assert!(cfg.max_connections > 0);
        assert!(cfg.connect_timeout_secs > 0);
        assert!(cfg.acquire_timeout_secs >= cfg.connect_timeout_secs);
    }

    #[tokio::test]
    async fn rejects_malformed_url() {
        let cfg = DbConfig {
            database_url: "not-a-url".into(),
            ..DbConfig::default()
        };
        assert!(matches!(
            create_pool(cfg).await,
            Err(DbPoolError::InvalidUrl(_))
        ));
    }
}
