//! Store configuration.

use std::time::Duration;

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL URL; `None` selects the in-memory store
    pub database_url: Option<String>,
    /// Connections kept open
    pub pool_size: u32,
    /// Extra connections allowed under load
    pub max_overflow: u32,
    pub acquire_timeout: Duration,
    /// Apply embedded migrations on connect
    pub run_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: 5,
            max_overflow: 10,
            acquire_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            pool_size: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.pool_size),
            max_overflow: std::env::var("DATABASE_MAX_OVERFLOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_overflow),
            acquire_timeout: std::env::var("DATABASE_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
            run_migrations: std::env::var("DATABASE_RUN_MIGRATIONS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.run_migrations),
        }
    }

    pub fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_connections() {
        let config = StoreConfig::default();
        assert_eq!(config.max_connections(), 15);

        let config = StoreConfig {
            pool_size: 0,
            max_overflow: 0,
            ..Default::default()
        };
        assert_eq!(config.max_connections(), 1);
    }
}
