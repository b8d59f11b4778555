//! Connection configuration for the relational store and the side cache.
//!
//! Values are read once at startup by the surrounding application. A
//! missing required value is a fatal startup condition, reported as a
//! [`ConfigError`]; optional values fall back to conventional defaults.

use std::str::FromStr;
use switchboard_core::ConfigError;

/// MySQL connection configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    /// Read the configuration from environment variables.
    ///
    /// - `SWITCHBOARD_DB_HOST` (required)
    /// - `SWITCHBOARD_DB_PORT` (default: 3306)
    /// - `SWITCHBOARD_DB_USER` (required)
    /// - `SWITCHBOARD_DB_PASSWORD` (required)
    /// - `SWITCHBOARD_DB_NAME` (required)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: require(&lookup, "SWITCHBOARD_DB_HOST")?,
            port: optional_parsed(&lookup, "SWITCHBOARD_DB_PORT", 3306)?,
            user: require(&lookup, "SWITCHBOARD_DB_USER")?,
            password: require(&lookup, "SWITCHBOARD_DB_PASSWORD")?,
            database: require(&lookup, "SWITCHBOARD_DB_NAME")?,
        })
    }
}

/// Redis connection configuration for the query cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Logical database index holding the query cache.
    pub db: i64,
}

impl CacheConfig {
    /// Read the configuration from environment variables.
    ///
    /// - `SWITCHBOARD_CACHE_HOST` (required)
    /// - `SWITCHBOARD_CACHE_PORT` (default: 6379)
    /// - `SWITCHBOARD_CACHE_PASSWORD` (required)
    /// - `SWITCHBOARD_CACHE_DB` (default: 4)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: require(&lookup, "SWITCHBOARD_CACHE_HOST")?,
            port: optional_parsed(&lookup, "SWITCHBOARD_CACHE_PORT", 6379)?,
            password: require(&lookup, "SWITCHBOARD_CACHE_PASSWORD")?,
            db: optional_parsed(&lookup, "SWITCHBOARD_CACHE_DB", 4)?,
        })
    }

    /// Connection URL in the form the redis client expects.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

fn require<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            field: name.to_string(),
        })
}

fn optional_parsed<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name).filter(|value| !value.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw,
            reason: "expected a number".to_string(),
        }),
    }
}
