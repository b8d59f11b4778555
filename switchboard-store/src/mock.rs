//! In-memory test doubles for the connection source and the side store.
//!
//! [`MemoryStore`] is a real, TTL-aware implementation of [`CacheStore`];
//! [`MockDb`] is a scriptable [`ConnectionSource`] that records every
//! call it sees. Integration tests drive the production executors
//! against these instead of live servers.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use switchboard_core::{CacheError, DbError, Params, Row};

use crate::cache::CacheStore;
use crate::conn::{ConnectionSource, DbConnection, ExecResult};

// ============================================================================
// MEMORY CACHE STORE
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    strings: HashMap<String, (String, Option<Instant>)>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-memory cache store with TTL expiry and a poisoning switch to
/// simulate an unreachable store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    poisoned: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, as an unreachable store
    /// would.
    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.poisoned.store(false, Ordering::SeqCst);
    }

    /// Whether a live (non-expired) entry or set exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if is_expired(&inner, key) {
            inner.strings.remove(key);
        }
        inner.strings.contains_key(key) || inner.sets.contains_key(key)
    }

    fn guard(&self) -> Result<(), CacheError> {
        if self.poisoned.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable {
                reason: "store poisoned".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn is_expired(inner: &MemoryInner, key: &str) -> bool {
    matches!(
        inner.strings.get(key),
        Some((_, Some(at))) if *at <= Instant::now()
    )
}

/// Minimal glob match supporting only the `*` wildcard, the one shape
/// the table index uses.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == candidate;
    }
    let mut rest = candidate;
    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else if let Some(at) = rest.find(segment) {
            rest = &rest[at + segment.len()..];
        } else {
            return false;
        }
    }
    true
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.guard()?;
        let mut inner = self.inner.lock().unwrap();
        if is_expired(&inner, key) {
            inner.strings.remove(key);
            return Ok(None);
        }
        Ok(inner.strings.get(key).map(|(value, _)| value.clone()))
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.guard()?;
        let mut inner = self.inner.lock().unwrap();
        inner.strings.insert(
            key.to_string(),
            (value.to_string(), Some(Instant::now() + ttl)),
        );
        Ok(())
    }

    fn sadd(&self, key: &str, member: &str) -> Result<(), CacheError> {
        self.guard()?;
        let mut inner = self.inner.lock().unwrap();
        inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        self.guard()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sets
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        self.guard()?;
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            inner.strings.remove(key);
            inner.sets.remove(key);
        }
        Ok(())
    }

    fn scan_match(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.guard()?;
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.sets.keys())
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        matches.sort();
        matches.dedup();
        Ok(matches)
    }
}

// ============================================================================
// MOCK CONNECTION SOURCE
// ============================================================================

/// Everything a mock connection was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    Acquire,
    Release,
    Begin,
    Commit,
    Rollback,
    Query(String),
    Execute(String),
}

#[derive(Default)]
struct MockState {
    query_results: VecDeque<Result<Vec<Row>, DbError>>,
    exec_results: VecDeque<Result<ExecResult, DbError>>,
    fail_connect: bool,
    fail_ping: bool,
    fail_next_commit: Option<DbError>,
    events: Vec<MockEvent>,
    opened: usize,
}

/// Scriptable connection source. Results are queued ahead of time;
/// unqueued calls get benign defaults (no rows, one affected row).
#[derive(Clone, Default)]
pub struct MockDb {
    state: Arc<Mutex<MockState>>,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_query_result(&self, result: Result<Vec<Row>, DbError>) {
        self.state.lock().unwrap().query_results.push_back(result);
    }

    pub fn push_exec_result(&self, result: Result<ExecResult, DbError>) {
        self.state.lock().unwrap().exec_results.push_back(result);
    }

    /// Queue `count` default successes ahead of a scripted failure.
    pub fn push_exec_ok(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.exec_results.push_back(Ok(ExecResult {
                affected_rows: 1,
                last_insert_id: 0,
            }));
        }
    }

    pub fn fail_connections(&self) {
        self.state.lock().unwrap().fail_connect = true;
    }

    pub fn fail_ping(&self) {
        self.state.lock().unwrap().fail_ping = true;
    }

    pub fn fail_next_commit(&self, reason: &str) {
        self.state.lock().unwrap().fail_next_commit = Some(DbError::CommitFailed {
            reason: reason.to_string(),
        });
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn opened_connections(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn query_count(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::Query(_)))
    }

    pub fn execute_count(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::Execute(_)))
    }

    pub fn commit_count(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::Commit))
    }

    pub fn rollback_count(&self) -> usize {
        self.count(|e| matches!(e, MockEvent::Rollback))
    }

    fn count<F: Fn(&MockEvent) -> bool>(&self, pred: F) -> usize {
        self.state.lock().unwrap().events.iter().filter(|e| pred(e)).count()
    }
}

impl ConnectionSource for MockDb {
    type Conn = MockConnection;

    fn acquire(&self) -> Result<MockConnection, DbError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connect {
            return Err(DbError::ConnectionFailed {
                reason: "scripted connection failure".to_string(),
            });
        }
        state.opened += 1;
        state.events.push(MockEvent::Acquire);
        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }

    fn release(&self, _conn: MockConnection) {
        self.state.lock().unwrap().events.push(MockEvent::Release);
    }
}

/// Connection handle produced by [`MockDb`].
pub struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

impl DbConnection for MockConnection {
    fn query(&mut self, sql: &str, _params: &Params) -> Result<Vec<Row>, DbError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(MockEvent::Query(sql.to_string()));
        state.query_results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn execute(&mut self, sql: &str, _params: &Params) -> Result<ExecResult, DbError> {
        let mut state = self.state.lock().unwrap();
        state.events.push(MockEvent::Execute(sql.to_string()));
        state.exec_results.pop_front().unwrap_or_else(|| {
            Ok(ExecResult {
                affected_rows: 1,
                last_insert_id: 0,
            })
        })
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.state.lock().unwrap().events.push(MockEvent::Begin);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_next_commit.take() {
            return Err(err);
        }
        state.events.push(MockEvent::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.state.lock().unwrap().events.push(MockEvent::Rollback);
        Ok(())
    }

    fn ping(&mut self) -> bool {
        !self.state.lock().unwrap().fail_ping
    }
}
