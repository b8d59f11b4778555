//! Query-result caching in a key-value side store.
//!
//! [`CacheStore`] is the raw primitive surface (strings, sets, pattern
//! enumeration); [`RedisStore`] is the production implementation;
//! [`QueryCache`] is the typed wrapper that serializes row sets through
//! the value codec. Caching is strictly best-effort: a lookup failure is
//! a miss and a store failure is a logged no-op, so the cache can never
//! turn a working read or write path into a failing one.

use std::sync::Arc;
use std::time::Duration;

use redis::Commands;
use switchboard_core::{decode_rows, encode_rows, CacheError, CacheKey, Row};

use crate::config::CacheConfig;

/// Default expiration for cached result sets: one day.
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Raw key-value surface of the side store.
///
/// `scan_match` exists for table-wide invalidation: index entries are
/// enumerated by pattern instead of being tracked in a parallel
/// aggregate key.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    fn sadd(&self, key: &str, member: &str) -> Result<(), CacheError>;
    fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError>;
    fn del(&self, keys: &[String]) -> Result<(), CacheError>;
    fn scan_match(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}

/// Production cache store over Redis.
///
/// Each operation opens its own short-lived connection, matching the
/// layer's no-shared-state model; the client handle itself is cheap.
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(config.url()).map_err(|e| CacheError::Unavailable {
            reason: e.to_string(),
        })?;
        Ok(Self { client })
    }

    fn connect(&self) -> Result<redis::Connection, CacheError> {
        self.client
            .get_connection()
            .map_err(|e| CacheError::Unavailable {
                reason: e.to_string(),
            })
    }
}

fn op_failed(key: &str, err: redis::RedisError) -> CacheError {
    CacheError::OperationFailed {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

impl CacheStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connect()?;
        conn.get(key).map_err(|e| op_failed(key, e))
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connect()?;
        let _: () = conn
            .set_ex(key, value, ttl.as_secs())
            .map_err(|e| op_failed(key, e))?;
        Ok(())
    }

    fn sadd(&self, key: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.connect()?;
        let _: () = conn.sadd(key, member).map_err(|e| op_failed(key, e))?;
        Ok(())
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connect()?;
        conn.smembers(key).map_err(|e| op_failed(key, e))
    }

    fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connect()?;
        let _: () = conn
            .del(keys.to_vec())
            .map_err(|e| op_failed(&keys.join(","), e))?;
        Ok(())
    }

    fn scan_match(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connect()?;
        let keys: Vec<String> = conn
            .scan_match::<&str, String>(pattern)
            .map_err(|e| op_failed(pattern, e))?
            .collect();
        Ok(keys)
    }
}

/// Typed cache of serialized result sets, with TTL.
pub struct QueryCache<S> {
    store: Arc<S>,
}

impl<S: CacheStore> QueryCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Cached rows for `key`, or `None`. A store failure is a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<Row>> {
        match self.store.get(key.as_str()) {
            Ok(Some(serialized)) => match serde_json::from_str::<serde_json::Value>(&serialized) {
                Ok(json) => Some(decode_rows(&json)),
                Err(e) => {
                    tracing::error!(error = %e, %key, "corrupt cache entry, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::error!(error = %e, %key, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Store `rows` under `key` with the given expiration. Best-effort:
    /// failures are logged and otherwise ignored.
    pub fn set(&self, key: &CacheKey, rows: &[Row], ttl: Duration) {
        let serialized = encode_rows(rows).to_string();
        if let Err(e) = self.store.set_ex(key.as_str(), &serialized, ttl) {
            tracing::error!(error = %e, %key, "failed to cache query result");
        }
    }
}
