//! Switchboard Store - Cached Relational Access
//!
//! The I/O layer of the switchboard data stack: per-operation MySQL
//! connections (no pooling, by design), a Redis-backed query cache keyed
//! by (query text, parameters), a per-table index of cache keys for
//! write-path invalidation, and the read/write/batch executors that tie
//! them together. Every public operation returns the uniform
//! [`QueryOutcome`] envelope instead of raising.
//!
//! Pure value handling (codec, keying, table extraction) lives in
//! `switchboard-core`. In-memory test doubles for both backends live in
//! [`mock`].

pub mod cache;
pub mod config;
pub mod conn;
pub mod db;
pub mod index;
pub mod mock;
pub mod outcome;

pub use cache::{CacheStore, QueryCache, RedisStore, DEFAULT_TTL};
pub use config::{CacheConfig, DbConfig};
pub use conn::{ConnectionSource, DbConnection, ExecResult, MysqlConnection, MysqlSource};
pub use db::{CommandOptions, Database, FetchMode, QueryOptions, Returning};
pub use index::TableIndex;
pub use mock::{MemoryStore, MockConnection, MockDb, MockEvent};
pub use outcome::{Payload, QueryOutcome};
