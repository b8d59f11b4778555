//! Per-table registry of cache keys for write-path invalidation.
//!
//! Every cached result set is registered under
//! `table_cache:<table>:<param_hash>` for each table its query touches.
//! Invalidation comes in two scopes: one parameter shape, or the whole
//! table (every shape, enumerated by pattern). The enumerate-then-delete
//! sequence is not atomic as a whole; a concurrent writer can slip
//! between the two steps, which this best-effort design accepts.

use std::sync::Arc;

use switchboard_core::{CacheKey, ParamHash};

use crate::cache::CacheStore;

/// Prefix shared by every index entry in the side store.
const TABLE_KEY_PREFIX: &str = "table_cache";

fn entry_key(table: &str, hash: &ParamHash) -> String {
    format!("{TABLE_KEY_PREFIX}:{table}:{hash}")
}

pub struct TableIndex<S> {
    store: Arc<S>,
}

impl<S: CacheStore> TableIndex<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Track `key` as dependent on `table` under one parameter shape.
    pub fn register(&self, table: &str, hash: &ParamHash, key: &CacheKey) {
        if let Err(e) = self.store.sadd(&entry_key(table, hash), key.as_str()) {
            tracing::error!(error = %e, table, "failed to register cache key in table index");
        }
    }

    /// Drop every cache key registered for `table` under `hash`, then the
    /// index entry itself.
    pub fn invalidate_params(&self, table: &str, hash: &ParamHash) {
        self.drop_entries(table, vec![entry_key(table, hash)]);
    }

    /// Drop every cache key ever registered for `table`, across all
    /// parameter shapes.
    pub fn invalidate_table(&self, table: &str) {
        let pattern = format!("{TABLE_KEY_PREFIX}:{table}:*");
        match self.store.scan_match(&pattern) {
            Ok(entries) => self.drop_entries(table, entries),
            Err(e) => {
                tracing::error!(error = %e, table, "failed to enumerate table index entries");
            }
        }
    }

    fn drop_entries(&self, table: &str, entries: Vec<String>) {
        let mut doomed: Vec<String> = Vec::new();
        for entry in entries {
            match self.store.smembers(&entry) {
                Ok(mut keys) => {
                    doomed.append(&mut keys);
                    doomed.push(entry);
                }
                Err(e) => {
                    tracing::error!(error = %e, table, "failed to read table index entry");
                }
            }
        }
        if doomed.is_empty() {
            return;
        }
        match self.store.del(&doomed) {
            Ok(()) => {
                tracing::info!(table, dropped = doomed.len(), "invalidated cache entries");
            }
            Err(e) => {
                tracing::error!(error = %e, table, "failed to invalidate cache entries");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::mock::MemoryStore;
    use std::time::Duration;
    use switchboard_core::Params;

    fn key_for(query: &str, params: &Params) -> CacheKey {
        CacheKey::derive(query, params)
    }

    fn seed(store: &MemoryStore, key: &CacheKey) {
        store
            .set_ex(key.as_str(), "[]", Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_register_then_invalidate_params() {
        let store = Arc::new(MemoryStore::new());
        let index = TableIndex::new(Arc::clone(&store));

        let params = Params::positional([1i64]);
        let hash = ParamHash::derive(&params);
        let key = key_for("SELECT * FROM users WHERE id = ?", &params);
        seed(&store, &key);

        index.register("users", &hash, &key);
        index.invalidate_params("users", &hash);

        assert!(!store.contains(key.as_str()));
        assert!(!store.contains(&entry_key("users", &hash)));
    }

    #[test]
    fn test_param_scoped_invalidation_leaves_other_shapes() {
        let store = Arc::new(MemoryStore::new());
        let index = TableIndex::new(Arc::clone(&store));

        let p1 = Params::positional([1i64]);
        let p2 = Params::positional([2i64]);
        let h1 = ParamHash::derive(&p1);
        let h2 = ParamHash::derive(&p2);
        let k1 = key_for("SELECT * FROM users WHERE id = ?", &p1);
        let k2 = key_for("SELECT * FROM users WHERE id = ?", &p2);
        seed(&store, &k1);
        seed(&store, &k2);

        index.register("users", &h1, &k1);
        index.register("users", &h2, &k2);
        index.invalidate_params("users", &h1);

        assert!(!store.contains(k1.as_str()));
        assert!(store.contains(k2.as_str()));
    }

    #[test]
    fn test_table_wide_invalidation_drops_every_shape() {
        let store = Arc::new(MemoryStore::new());
        let index = TableIndex::new(Arc::clone(&store));

        let p1 = Params::positional([1i64]);
        let p2 = Params::named([("unit", "engine four")]);
        let k1 = key_for("SELECT * FROM calls WHERE id = ?", &p1);
        let k2 = key_for("SELECT * FROM calls WHERE unit = :unit", &p2);
        seed(&store, &k1);
        seed(&store, &k2);

        index.register("calls", &ParamHash::derive(&p1), &k1);
        index.register("calls", &ParamHash::derive(&p2), &k2);
        index.invalidate_table("calls");

        assert!(!store.contains(k1.as_str()));
        assert!(!store.contains(k2.as_str()));
        assert!(store.scan_match("table_cache:calls:*").unwrap().is_empty());
    }

    #[test]
    fn test_invalidating_other_table_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        let index = TableIndex::new(Arc::clone(&store));

        let params = Params::positional([1i64]);
        let key = key_for("SELECT * FROM users WHERE id = ?", &params);
        seed(&store, &key);
        index.register("users", &ParamHash::derive(&params), &key);

        index.invalidate_table("calls");
        assert!(store.contains(key.as_str()));
    }

    #[test]
    fn test_invalidation_survives_store_failure() {
        let store = Arc::new(MemoryStore::new());
        let index = TableIndex::new(Arc::clone(&store));

        store.poison();
        index.invalidate_table("users");
        index.invalidate_params("users", &ParamHash::derive(&Params::None));
    }
}
