//! Deterministic cache-key derivation.
//!
//! A cached result set is identified by a digest over the query text plus
//! the stable, key-sorted JSON encoding of its parameters. A second digest
//! over the parameters alone groups table-index entries by invocation
//! shape. Both are pure functions: same inputs, same digest, always.
//!
//! The digest is not a security boundary; it only has to be deterministic
//! and collision-resistant enough for cache correctness.

use crate::codec::encode_value;
use crate::value::Params;
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of one cached result set, derived from (query text,
/// parameter set). Hex-encoded SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

/// Digest of a parameter set alone, independent of query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamHash(String);

/// Stable textual encoding of a parameter set. Named parameters are
/// key-sorted by construction ([`Params::Named`] is a `BTreeMap`), so the
/// serialized form is order-insensitive.
fn stable_param_encoding(params: &Params) -> String {
    let json = match params {
        Params::None => Json::Null,
        Params::Positional(values) => Json::Array(values.iter().map(encode_value).collect()),
        Params::Named(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect(),
        ),
    };
    json.to_string()
}

impl CacheKey {
    /// Derive the cache key for a query and its parameters.
    pub fn derive(query: &str, params: &Params) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        hasher.update(b":");
        hasher.update(stable_param_encoding(params).as_bytes());
        CacheKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ParamHash {
    /// Derive the parameter-shape hash, independent of query text.
    pub fn derive(params: &Params) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(stable_param_encoding(params).as_bytes());
        ParamHash(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ParamHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ParamHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
