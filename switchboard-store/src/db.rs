//! Read, write, and batch execution over a connection source, a query
//! cache, and a table index.
//!
//! The read path is cache-or-execute-then-populate; the write path is
//! execute-commit-then-invalidate; the batch path is chunked commits with
//! no invalidation of its own (callers that need cache consistency after
//! a bulk write invalidate explicitly through [`Database::index`]).

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::{extract_tables, CacheKey, DbError, ParamHash, Params, Row, SqlValue};

use crate::cache::{CacheStore, QueryCache, DEFAULT_TTL};
use crate::conn::{ConnectionSource, DbConnection, ExecResult};
use crate::index::TableIndex;
use crate::outcome::{Payload, QueryOutcome};

const QUERY_OK: &str = "Query executed successfully";
const COMMIT_OK: &str = "Commit executed successfully";
const BATCH_OK: &str = "Batch commit executed successfully";

/// How many rows a read fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Every row of the result set.
    All,
    /// At most this many rows.
    Many(usize),
    /// The first row, if any.
    One,
}

/// Read-path options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub fetch: FetchMode,
    pub use_cache: bool,
    pub ttl: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            fetch: FetchMode::All,
            use_cache: true,
            ttl: DEFAULT_TTL,
        }
    }
}

impl QueryOptions {
    /// Read-path options that bypass the cache entirely.
    pub fn uncached(fetch: FetchMode) -> Self {
        Self {
            fetch,
            use_cache: false,
            ttl: DEFAULT_TTL,
        }
    }
}

/// What a write reports back in its envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Returning {
    #[default]
    Nothing,
    LastInsertId,
    AffectedRows,
}

/// Write-path options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOptions {
    pub returning: Returning,
    /// Invalidate cache entries for every table the command touches.
    pub invalidate: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            returning: Returning::Nothing,
            invalidate: true,
        }
    }
}

/// The data-access facade: a connection source for the relational store
/// plus the query cache and table index over one shared side store.
pub struct Database<C, S> {
    conns: C,
    cache: QueryCache<S>,
    index: TableIndex<S>,
}

impl<C, S> Database<C, S>
where
    C: ConnectionSource,
    S: CacheStore,
{
    pub fn new(conns: C, store: Arc<S>) -> Self {
        Self {
            conns,
            cache: QueryCache::new(Arc::clone(&store)),
            index: TableIndex::new(store),
        }
    }

    /// The table index, for callers that invalidate explicitly (e.g.
    /// after a batch write).
    pub fn index(&self) -> &TableIndex<S> {
        &self.index
    }

    /// The query cache.
    pub fn cache(&self) -> &QueryCache<S> {
        &self.cache
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Execute a read query, serving from cache when possible.
    ///
    /// On a miss (or with caching off) the query runs against a fresh
    /// connection; on success with caching on, the touched tables are
    /// registered in the index and the rows stored with the requested
    /// TTL. Failures come back as a failure envelope, never an error.
    pub fn execute_query(&self, query: &str, params: &Params, options: &QueryOptions) -> QueryOutcome {
        let cache_key = CacheKey::derive(query, params);

        if options.use_cache {
            if let Some(rows) = self.cache.get(&cache_key) {
                tracing::debug!(%cache_key, query, "cache hit");
                return QueryOutcome::ok(QUERY_OK, shape_rows(rows, options.fetch));
            }
        }

        let mut conn = match self.conns.acquire() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, query, ?params, "failed to acquire connection");
                return QueryOutcome::fail(e.to_string());
            }
        };

        let outcome = match conn.query(query, params) {
            Ok(rows) => {
                let rows = limit_rows(rows, options.fetch);
                if options.use_cache {
                    let param_hash = ParamHash::derive(params);
                    for table in extract_tables(query) {
                        self.index.register(&table, &param_hash, &cache_key);
                    }
                    self.cache.set(&cache_key, &rows, options.ttl);
                }
                QueryOutcome::ok(QUERY_OK, shape_rows(rows, options.fetch))
            }
            Err(e) => {
                tracing::error!(error = %e, query, ?params, "query execution failed");
                QueryOutcome::fail(e.to_string())
            }
        };

        self.conns.release(conn);
        outcome
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Execute a write command and commit it.
    ///
    /// Either the statement commits and cache invalidation is attempted
    /// for every touched table, or it rolls back and no invalidation
    /// happens.
    pub fn execute_commit(
        &self,
        command: &str,
        params: &Params,
        options: &CommandOptions,
    ) -> QueryOutcome {
        let mut conn = match self.conns.acquire() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, command, ?params, "failed to acquire connection");
                return QueryOutcome::fail(e.to_string());
            }
        };

        let outcome = match run_commit(&mut conn, command, params) {
            Ok(exec) => {
                tracing::debug!(command, ?params, "commit executed");
                if options.invalidate {
                    for table in extract_tables(command) {
                        self.index.invalidate_table(&table);
                    }
                }
                let payload = match options.returning {
                    Returning::Nothing => Payload::Empty,
                    Returning::LastInsertId => Payload::Id(exec.last_insert_id),
                    Returning::AffectedRows => Payload::Count(exec.affected_rows),
                };
                QueryOutcome::ok(COMMIT_OK, payload)
            }
            Err(e) => {
                tracing::error!(error = %e, command, ?params, "commit execution failed");
                if let Err(rb) = conn.rollback() {
                    tracing::error!(error = %rb, "rollback failed");
                }
                QueryOutcome::fail(format!("Commit execution error: {e}"))
            }
        };

        self.conns.release(conn);
        outcome
    }

    /// Execute a write command once per parameter set, in chunks of
    /// `batch_size`, committing after each chunk.
    ///
    /// One connection serves the whole batch. A failing chunk is rolled
    /// back and aborts the remainder, but chunks already committed stay
    /// committed: partial application is documented behavior of this
    /// path, not a defect. No cache invalidation happens here.
    pub fn execute_batch_commit(
        &self,
        command: &str,
        rows: &[Params],
        batch_size: usize,
    ) -> QueryOutcome {
        if rows.is_empty() {
            tracing::warn!(command, "no rows provided for batch execution");
            return QueryOutcome::fail("No rows provided for batch execution");
        }
        if batch_size == 0 {
            return QueryOutcome::fail("Batch size must be at least 1");
        }

        let mut conn = match self.conns.acquire() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, command, "failed to acquire connection");
                return QueryOutcome::fail(e.to_string());
            }
        };

        let total = rows.len().div_ceil(batch_size);
        let mut outcome = QueryOutcome::ok(BATCH_OK, Payload::Empty);
        for (chunk_index, chunk) in rows.chunks(batch_size).enumerate() {
            if let Err(e) = run_chunk(&mut conn, command, chunk) {
                tracing::error!(error = %e, command, chunk = chunk_index + 1, "batch chunk failed");
                if let Err(rb) = conn.rollback() {
                    tracing::error!(error = %rb, "rollback failed");
                }
                outcome = QueryOutcome::fail(format!("Batch commit error: {e}"));
                break;
            }
            tracing::info!(chunk = chunk_index + 1, total, "batch chunk committed");
        }

        self.conns.release(conn);
        outcome
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// The server version string, if the store is reachable.
    pub fn server_version(&self) -> Option<String> {
        let outcome = self.execute_query(
            "SELECT VERSION()",
            &Params::None,
            &QueryOptions::uncached(FetchMode::One),
        );
        if !outcome.success {
            return None;
        }
        match outcome.result {
            Payload::Row(Some(row)) => row.get("VERSION()").and_then(|value| match value {
                SqlValue::Str(version) => Some(version.clone()),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Whether `table` exists in the configured database.
    pub fn table_exists(&self, table: &str) -> bool {
        let params = Params::positional([table]);
        let outcome = self.execute_query(
            "SHOW TABLES LIKE ?",
            &params,
            &QueryOptions::uncached(FetchMode::One),
        );
        outcome.success && matches!(outcome.result, Payload::Row(Some(_)))
    }

    /// Whether the relational store is reachable right now.
    pub fn is_connected(&self) -> bool {
        match self.conns.acquire() {
            Ok(mut conn) => {
                let alive = conn.ping();
                self.conns.release(conn);
                alive
            }
            Err(e) => {
                tracing::error!(error = %e, "connection check failed");
                false
            }
        }
    }
}

fn run_commit<D: DbConnection>(
    conn: &mut D,
    command: &str,
    params: &Params,
) -> Result<ExecResult, DbError> {
    conn.begin()?;
    let exec = conn.execute(command, params)?;
    conn.commit()?;
    Ok(exec)
}

fn run_chunk<D: DbConnection>(conn: &mut D, command: &str, chunk: &[Params]) -> Result<(), DbError> {
    conn.begin()?;
    for params in chunk {
        conn.execute(command, params)?;
    }
    conn.commit()
}

fn limit_rows(mut rows: Vec<Row>, fetch: FetchMode) -> Vec<Row> {
    match fetch {
        FetchMode::All => rows,
        FetchMode::Many(limit) => {
            rows.truncate(limit);
            rows
        }
        FetchMode::One => {
            rows.truncate(1);
            rows
        }
    }
}

fn shape_rows(rows: Vec<Row>, fetch: FetchMode) -> Payload {
    match fetch {
        FetchMode::All | FetchMode::Many(_) => Payload::Rows(rows),
        FetchMode::One => Payload::Row(rows.into_iter().next()),
    }
}
