//! Connection settings for the `PostgreSQL` store.

use kickwall_core::{EngineError, Result};
use std::time::Duration;

/// Connection settings for [`PostgresStore`](crate::PostgresStore).
///
/// # Example
///
/// ```
/// use kickwall_postgres::PostgresConfig;
/// use std::time::Duration;
///
/// let config = PostgresConfig::new("postgres://localhost/kickwall")
///     .with_max_connections(20)
///     .with_lock_timeout(Duration::from_secs(1));
/// assert_eq!(config.max_connections, 20);
/// ```
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Connection string, e.g. `postgres://localhost/kickwall`.
    pub url: String,
    /// Largest number of pooled connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait when acquiring a connection from the pool.
    pub connect_timeout: Duration,
    /// How long a transaction waits on a row lock before giving up.
    /// Hitting the limit surfaces as a retryable conflict.
    pub lock_timeout: Duration,
}

impl PostgresConfig {
    /// Settings with defaults for everything but the URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(2),
        }
    }

    /// Read the URL from `KICKWALL_DATABASE_URL`, falling back to
    /// `DATABASE_URL`.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] if neither variable is set.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("KICKWALL_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| {
                EngineError::validation("KICKWALL_DATABASE_URL or DATABASE_URL must be set")
            })?;
        Ok(Self::new(url))
    }

    /// Override the pool's connection ceiling.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Override the number of idle connections kept open.
    #[must_use]
    pub fn with_min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    /// Override the pool acquire timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Override the per-transaction lock timeout.
    #[must_use]
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = PostgresConfig::new("postgres://localhost/kickwall");
        assert_eq!(config.url, "postgres://localhost/kickwall");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.lock_timeout, Duration::from_secs(2));
    }

    #[test]
    fn builders_override_defaults() {
        let config = PostgresConfig::new("postgres://localhost/kickwall")
            .with_max_connections(32)
            .with_min_connections(2)
            .with_connect_timeout(Duration::from_secs(1))
            .with_lock_timeout(Duration::from_millis(250));
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
    }
}
