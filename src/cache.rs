//! Client-side task cache.
//!
//! An advisory, short-lived cache of normalized task lists keyed by owner
//! email. The upstream API stays the source of truth: every mutation
//! invalidates the owner's entry and the next read goes live. Storage sits
//! behind the minimal [`CacheStore`] trait so the backend can be swapped
//! (embedded sqlite for the gateway, in-memory for tests); store failures
//! always degrade to a cache miss or a no-op, never an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::models::Task;

pub const CACHE_NAMESPACE: &str = "ohmytasks";
pub const CACHE_VERSION: &str = "v1";
/// Freshness window: cached reads older than this go back upstream.
pub const CACHE_TTL_MS: i64 = 5 * 60 * 1000;
/// Identity used when no email is supplied.
pub const ANONYMOUS: &str = "anonymous";

/// Minimal key-value surface the cache needs from a backend.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store; also what tests use.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

/// Store that drops everything; used when persistent storage is unavailable.
struct NoopStore;

impl CacheStore for NoopStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) {}

    fn remove(&self, _key: &str) {}
}

/// Embedded sqlite key-value store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }

        let conn = Connection::open(path).context("Failed to open cache store")?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        let conn = self.conn.lock().unwrap();
        match conn
            .query_row("SELECT value FROM cache WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
        {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(%key, error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        let conn = self.conn.lock().unwrap();
        if let Err(err) = conn.execute(
            "INSERT OR REPLACE INTO cache (key, value) VALUES (?1, ?2)",
            params![key, value],
        ) {
            tracing::debug!(%key, error = %err, "cache write failed, skipping");
        }
    }

    fn remove(&self, key: &str) {
        let conn = self.conn.lock().unwrap();
        if let Err(err) = conn.execute("DELETE FROM cache WHERE key = ?1", params![key]) {
            tracing::debug!(%key, error = %err, "cache remove failed, skipping");
        }
    }
}

/// Stored entry shape; versioned through the key prefix so format changes
/// invalidate wholesale.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: i64,
    tasks: Vec<Task>,
}

/// A cache hit: the tasks plus how stale they are.
#[derive(Debug)]
pub struct CachedTasks {
    pub tasks: Vec<Task>,
    /// Unix millis of the write.
    pub cached_at: i64,
    pub age_ms: i64,
}

/// Task cache over any [`CacheStore`].
pub struct TaskCache {
    store: Box<dyn CacheStore>,
    ttl_ms: i64,
}

impl TaskCache {
    pub fn new(store: Box<dyn CacheStore>) -> Self {
        Self::with_ttl(store, CACHE_TTL_MS)
    }

    pub fn with_ttl(store: Box<dyn CacheStore>, ttl_ms: i64) -> Self {
        Self { store, ttl_ms }
    }

    /// Sqlite-backed cache; degrades to a no-op cache if the store cannot
    /// be opened, so reads simply always go live.
    pub fn open_default(path: &Path) -> Self {
        match SqliteStore::open(path) {
            Ok(store) => Self::new(Box::new(store)),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "cache store unavailable, caching disabled");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NoopStore))
    }

    fn key(email: Option<&str>) -> String {
        format!(
            "{}:{}:tasks:{}",
            CACHE_NAMESPACE,
            CACHE_VERSION,
            email.unwrap_or(ANONYMOUS)
        )
    }

    /// Fresh entry for this identity, if any. Expired entries are evicted.
    pub fn get(&self, email: Option<&str>) -> Option<CachedTasks> {
        let key = Self::key(email);
        let raw = self.store.get(&key)?;
        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(_) => {
                self.store.remove(&key);
                return None;
            }
        };

        let age_ms = Utc::now().timestamp_millis() - entry.timestamp;
        if age_ms > self.ttl_ms {
            self.store.remove(&key);
            return None;
        }

        Some(CachedTasks {
            tasks: entry.tasks,
            cached_at: entry.timestamp,
            age_ms,
        })
    }

    pub fn put(&self, email: Option<&str>, tasks: &[Task]) {
        let entry = CacheEntry {
            timestamp: Utc::now().timestamp_millis(),
            tasks: tasks.to_vec(),
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => self.store.set(&Self::key(email), &raw),
            Err(err) => {
                tracing::debug!(error = %err, "cache serialize failed, skipping");
            }
        }
    }

    /// Drop this identity's entry; the next read hits upstream.
    pub fn invalidate(&self, email: Option<&str>) {
        self.store.remove(&Self::key(email));
    }
}
