//! Database connection settings and pool management.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info};

use cinemax_core::config::{optional_var, parse_var, string_var};
use cinemax_core::{defaults, EnvSource, Error, Result};

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = defaults::DB_MAX_CONNECTIONS;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = defaults::DB_CONNECT_TIMEOUT_SECS;

/// Where to connect.
///
/// `url` (from `DATABASE_URL`) wins over the individual parts when set.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: defaults::DB_HOST.to_string(),
            port: defaults::DB_PORT,
            name: defaults::DB_NAME.to_string(),
            user: defaults::DB_USER.to_string(),
            password: defaults::DB_PASSWORD.to_string(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DatabaseConfig {
    /// Read `DATABASE_URL` and `DB_HOST` / `DB_PORT` / `DB_NAME` / `DB_USER` /
    /// `DB_PASSWORD`, falling back to the local development defaults.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        Ok(Self {
            url: optional_var(env, "DATABASE_URL"),
            host: string_var(env, "DB_HOST", defaults::DB_HOST),
            port: parse_var(env, "DB_PORT", defaults::DB_PORT)?,
            name: string_var(env, "DB_NAME", defaults::DB_NAME),
            user: string_var(env, "DB_USER", defaults::DB_USER),
            password: string_var(env, "DB_PASSWORD", defaults::DB_PASSWORD),
        })
    }

    /// Build sqlx connect options.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        match &self.url {
            Some(url) => PgConnectOptions::from_str(url)
                .map_err(|e| Error::Config(format!("DATABASE_URL is invalid: {}", e))),
            None => Ok(PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .database(&self.name)
                .username(&self.user)
                .password(&self.password)),
        }
    }

    /// Connection target without credentials, for logs.
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(_) => "DATABASE_URL".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.name),
        }
    }
}

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Create a PostgreSQL connection pool.
///
/// The connection is opened eagerly so a bad host or credential fails here
/// rather than at the first query.
pub async fn create_pool(database: &DatabaseConfig, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    let options = database.connect_options()?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        db_target = %database.display_target(),
        max_connections = config.max_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection established"
    );
    Ok(pool)
}

/// Close every connection in the pool.
pub async fn close_pool(pool: &PgPool) {
    debug!(
        subsystem = "db",
        component = "pool",
        op = "close",
        pool_size = pool.size(),
        "Closing database connection pool"
    );
    pool.close().await;
    info!(subsystem = "db", component = "pool", "Database connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_max_connections() {
        assert_eq!(DEFAULT_MAX_CONNECTIONS, 1);
    }

    #[test]
    fn test_pool_config_builder() {
        let config = PoolConfig::new()
            .max_connections(3)
            .connect_timeout(Duration::from_secs(5));

        assert_eq!(config.max_connections, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_database_config_defaults() {
        let env: HashMap<&str, &str> = HashMap::new();
        let config = DatabaseConfig::from_env(&env).unwrap();
        assert_eq!(config.url, None);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.name, "cinemax_db");
        assert_eq!(config.user, "postgres");
        assert_eq!(config.display_target(), "localhost:5432/cinemax_db");
    }

    #[test]
    fn test_database_config_from_parts() {
        let env = HashMap::from([
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "movies"),
            ("DB_USER", "etl"),
            ("DB_PASSWORD", "s3cret"),
        ]);
        let config = DatabaseConfig::from_env(&env).unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.password, "s3cret");
        assert!(config.connect_options().is_ok());
    }

    #[test]
    fn test_database_config_bad_port() {
        let env = HashMap::from([("DB_PORT", "fivefour")]);
        let err = DatabaseConfig::from_env(&env).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_database_url_overrides_parts() {
        let env = HashMap::from([
            ("DATABASE_URL", "postgres://u:p@remote:5433/other"),
            ("DB_HOST", "ignored"),
        ]);
        let config = DatabaseConfig::from_env(&env).unwrap();
        assert_eq!(config.display_target(), "DATABASE_URL");
        assert!(config.connect_options().is_ok());
    }

    #[test]
    fn test_invalid_database_url() {
        let config = DatabaseConfig {
            url: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(config.connect_options().unwrap_err().is_config());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = DatabaseConfig {
            password: "hunter2".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
