//! SQLite-backed persistent store.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::maintenance::MaintenanceTask;
use crate::types::config::StoreConfig;
use crate::{CacheError, CacheResult};

use super::{DurableTier, StoreStats};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS entries (
        namespace TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        stored_at INTEGER NOT NULL,
        ttl_ms INTEGER NOT NULL,
        PRIMARY KEY (namespace, key)
    );

    CREATE INDEX IF NOT EXISTS idx_entries_stored_at ON entries(namespace, stored_at);
"#;

/// Capacity- and TTL-bounded key-value store on SQLite.
///
/// Values are stored as JSON. When the database cannot be opened the store
/// stays usable but every operation is a miss or a no-op.
pub struct PersistentStore<V> {
    inner: Arc<StoreInner>,
    cleanup: Option<MaintenanceTask>,
    _marker: PhantomData<fn() -> V>,
}

struct StoreInner {
    // Mutex instead of RwLock because rusqlite::Connection is not Sync
    conn: Mutex<Option<Connection>>,
    namespace: String,
    capacity: usize,
    default_ttl: Duration,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn duration_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

impl StoreInner {
    fn with_conn<T, F>(conn: &Option<Connection>, f: F) -> CacheResult<T>
    where
        F: FnOnce(&Connection) -> CacheResult<T>,
    {
        match conn {
            Some(conn) => f(conn),
            None => Err(CacheError::unavailable("persistent store is not open")),
        }
    }

    async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let guard = self.conn.lock().await;
        Self::with_conn(&guard, |conn| {
            let row: Option<(String, i64, i64)> = conn
                .query_row(
                    "SELECT value, stored_at, ttl_ms FROM entries WHERE namespace = ? AND key = ?",
                    params![self.namespace, key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            match row {
                Some((_, stored_at, ttl_ms)) if now_millis() - stored_at > ttl_ms => {
                    conn.execute(
                        "DELETE FROM entries WHERE namespace = ? AND key = ?",
                        params![self.namespace, key],
                    )?;
                    tracing::debug!(key, "Expired durable entry removed on read");
                    Ok(None)
                }
                Some((value, _, _)) => Ok(Some(value)),
                None => Ok(None),
            }
        })
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        if self.capacity == 0 {
            return Ok(());
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        let guard = self.conn.lock().await;
        Self::with_conn(&guard, |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO entries (namespace, key, value, stored_at, ttl_ms)
                 VALUES (?, ?, ?, ?, ?)",
                params![self.namespace, key, value, now_millis(), duration_millis(ttl)],
            )?;

            if self.count(conn)? > self.capacity {
                self.cleanup(conn)?;
            }
            Ok(())
        })
    }

    fn count(&self, conn: &Connection) -> CacheResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE namespace = ?",
            params![self.namespace],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn purge_expired(&self, conn: &Connection) -> CacheResult<usize> {
        let removed = conn.execute(
            "DELETE FROM entries WHERE namespace = ? AND ? - stored_at > ttl_ms",
            params![self.namespace, now_millis()],
        )?;
        Ok(removed)
    }

    /// Drops expired entries, then the oldest ones until usage is about one
    /// fifth below capacity.
    fn cleanup(&self, conn: &Connection) -> CacheResult<usize> {
        let expired = self.purge_expired(conn)?;

        let target = self.capacity - self.capacity / 5;
        let count = self.count(conn)?;
        let oldest = if count > target {
            conn.execute(
                "DELETE FROM entries WHERE namespace = ?1 AND key IN (
                     SELECT key FROM entries WHERE namespace = ?1
                     ORDER BY stored_at ASC, rowid ASC
                     LIMIT ?2
                 )",
                params![self.namespace, (count - target) as i64],
            )?
        } else {
            0
        };

        tracing::debug!(
            namespace = %self.namespace,
            expired,
            oldest,
            "Durable store cleanup pass"
        );
        Ok(expired + oldest)
    }

    async fn run_cleanup(&self) -> CacheResult<usize> {
        let guard = self.conn.lock().await;
        Self::with_conn(&guard, |conn| {
            if self.count(conn)? > self.capacity {
                self.cleanup(conn)
            } else {
                self.purge_expired(conn)
            }
        })
    }
}

impl<V> PersistentStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Opens (or creates) the database at `config.db_path`.
    ///
    /// Failing to open the database is not an error: the store comes up
    /// unavailable and logs why.
    pub fn open(config: &StoreConfig) -> Self {
        match Self::open_connection(&config.db_path) {
            Ok(conn) => Self::from_connection(Some(conn), config),
            Err(e) => {
                tracing::warn!(
                    path = %config.db_path.display(),
                    error = %e,
                    "Durable store unavailable, continuing without it"
                );
                Self::from_connection(None, config)
            }
        }
    }

    /// Opens a private in-memory database.
    pub fn in_memory(config: &StoreConfig) -> Self {
        let conn = Connection::open_in_memory()
            .map_err(CacheError::from)
            .and_then(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(conn)
            });

        match conn {
            Ok(conn) => Self::from_connection(Some(conn), config),
            Err(e) => {
                tracing::warn!(error = %e, "In-memory store unavailable");
                Self::from_connection(None, config)
            }
        }
    }

    /// Creates a store with no backing storage.
    pub fn unavailable(config: &StoreConfig) -> Self {
        Self::from_connection(None, config)
    }

    fn open_connection(path: &Path) -> CacheResult<Connection> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn from_connection(conn: Option<Connection>, config: &StoreConfig) -> Self {
        let available = conn.is_some();
        let inner = Arc::new(StoreInner {
            conn: Mutex::new(conn),
            namespace: config.namespace.clone(),
            capacity: config.capacity,
            default_ttl: config.default_ttl(),
        });

        let cleanup = available.then(|| {
            MaintenanceTask::spawn(
                "store-cleanup",
                &inner,
                config.cleanup_interval(),
                |inner: Arc<StoreInner>| async move {
                    if let Err(e) = inner.run_cleanup().await {
                        tracing::warn!(error = %e, "Periodic durable store cleanup failed");
                    }
                },
            )
        });

        Self {
            inner,
            cleanup,
            _marker: PhantomData,
        }
    }

    /// Whether the backing database is open.
    pub async fn is_available(&self) -> bool {
        self.inner.conn.lock().await.is_some()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Looks up a key, degrading to `None` on storage failure.
    pub async fn get(&self, key: &str) -> Option<V> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Durable get failed");
                None
            }
        }
    }

    /// Stores a value, logging storage failures.
    pub async fn set(&self, key: &str, value: &V, ttl: Option<Duration>) {
        if let Err(e) = self.try_set(key, value, ttl).await {
            tracing::warn!(key, error = %e, "Durable set failed");
        }
    }

    /// Removes a key, logging storage failures.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.try_delete(key).await {
            tracing::warn!(key, error = %e, "Durable delete failed");
        }
    }

    /// Removes every entry in this namespace, logging storage failures.
    pub async fn clear(&self) {
        if let Err(e) = self.try_clear().await {
            tracing::warn!(error = %e, "Durable clear failed");
        }
    }

    /// Returns statistics, or empty ones if storage is unavailable.
    pub async fn stats(&self) -> StoreStats {
        self.try_stats().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Durable stats failed");
            StoreStats::default()
        })
    }

    /// Keys ordered from oldest to newest.
    pub async fn keys(&self) -> CacheResult<Vec<String>> {
        let guard = self.inner.conn.lock().await;
        StoreInner::with_conn(&guard, |conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM entries WHERE namespace = ? ORDER BY stored_at ASC, rowid ASC",
            )?;
            let keys: Vec<String> = stmt
                .query_map(params![self.inner.namespace], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(keys)
        })
    }

    /// Removes expired entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> CacheResult<usize> {
        let guard = self.inner.conn.lock().await;
        StoreInner::with_conn(&guard, |conn| self.inner.purge_expired(conn))
    }

    /// Runs a cleanup pass if the store is over capacity, otherwise only
    /// purges expired entries.
    pub async fn enforce_capacity(&self) -> CacheResult<usize> {
        self.inner.run_cleanup().await
    }

    /// Stops the periodic cleanup task.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.cleanup.as_mut() {
            task.shutdown();
        }
    }
}

#[async_trait]
impl<V> DurableTier<V> for PersistentStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn try_get(&self, key: &str) -> CacheResult<Option<V>> {
        match self.inner.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn try_set(&self, key: &str, value: &V, ttl: Option<Duration>) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.inner.set_raw(key, &raw, ttl).await
    }

    async fn try_delete(&self, key: &str) -> CacheResult<()> {
        let guard = self.inner.conn.lock().await;
        StoreInner::with_conn(&guard, |conn| {
            conn.execute(
                "DELETE FROM entries WHERE namespace = ? AND key = ?",
                params![self.inner.namespace, key],
            )?;
            Ok(())
        })
    }

    async fn try_clear(&self) -> CacheResult<()> {
        let guard = self.inner.conn.lock().await;
        StoreInner::with_conn(&guard, |conn| {
            let removed = conn.execute(
                "DELETE FROM entries WHERE namespace = ?",
                params![self.inner.namespace],
            )?;
            tracing::info!(namespace = %self.inner.namespace, removed, "Durable store cleared");
            Ok(())
        })
    }

    async fn try_stats(&self) -> CacheResult<StoreStats> {
        let guard = self.inner.conn.lock().await;
        StoreInner::with_conn(&guard, |conn| {
            let (size, oldest): (i64, Option<i64>) = conn.query_row(
                "SELECT COUNT(*), MIN(stored_at) FROM entries WHERE namespace = ?",
                params![self.inner.namespace],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            Ok(StoreStats {
                size: size as usize,
                oldest_entry: oldest.and_then(DateTime::<Utc>::from_timestamp_millis),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(capacity: usize) -> StoreConfig {
        StoreConfig {
            capacity,
            ..StoreConfig::default()
        }
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store: PersistentStore<String> = PersistentStore::in_memory(&config(10));
        store.set("fen", &"e2e4".to_string(), None).await;

        assert_eq!(store.get("fen").await.as_deref(), Some("e2e4"));
        assert!(store.get("other").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_read() {
        let store: PersistentStore<i32> = PersistentStore::in_memory(&config(10));
        store.set("short", &1, Some(Duration::from_millis(1))).await;
        store.set("long", &2, None).await;

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.get("short").await.is_none());
        assert_eq!(store.get("long").await, Some(2));
        assert_eq!(store.stats().await.size, 1);
    }

    #[tokio::test]
    async fn test_capacity_cleanup_removes_oldest() {
        let store: PersistentStore<usize> = PersistentStore::in_memory(&config(10));
        for i in 0..13 {
            store.set(&format!("k{:02}", i), &i, None).await;
            assert!(store.stats().await.size <= 10);
        }

        let keys = store.keys().await.unwrap();
        assert!(!keys.contains(&"k00".to_string()));
        assert!(!keys.contains(&"k01".to_string()));
        assert!(!keys.contains(&"k02".to_string()));
        assert!(keys.contains(&"k12".to_string()));
    }

    #[tokio::test]
    async fn test_cleanup_prefers_expired_entries() {
        let store: PersistentStore<usize> = PersistentStore::in_memory(&config(10));
        store.set("old", &0, None).await;
        for i in 0..5 {
            store.set(&format!("stale{}", i), &i, Some(Duration::from_millis(1))).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        for i in 0..6 {
            store.set(&format!("fresh{}", i), &i, None).await;
        }

        // the expired entries went first, so the oldest live entry survives
        assert_eq!(store.get("old").await, Some(0));
        assert_eq!(store.stats().await.size, 7);
    }

    #[tokio::test]
    async fn test_zero_capacity_stores_nothing() {
        let store: PersistentStore<i32> = PersistentStore::in_memory(&config(0));
        store.set("a", &1, None).await;
        assert!(store.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades() {
        let store: PersistentStore<i32> = PersistentStore::unavailable(&config(10));

        assert!(!store.is_available().await);
        store.set("a", &1, None).await;
        assert!(store.get("a").await.is_none());
        store.delete("a").await;
        store.clear().await;
        assert_eq!(store.stats().await, StoreStats::default());
        assert!(matches!(
            store.try_get("a").await,
            Err(CacheError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("store.db");

        let evals: PersistentStore<i32> = PersistentStore::open(&StoreConfig {
            db_path: db_path.clone(),
            namespace: "evals".into(),
            ..StoreConfig::default()
        });
        let moves: PersistentStore<i32> = PersistentStore::open(&StoreConfig {
            db_path,
            namespace: "moves".into(),
            ..StoreConfig::default()
        });

        evals.set("k", &1, None).await;
        moves.set("k", &2, None).await;
        moves.clear().await;

        assert_eq!(evals.get("k").await, Some(1));
        assert!(moves.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let cfg = StoreConfig {
            db_path: dir.path().join("nested/store.db"),
            ..StoreConfig::default()
        };

        {
            let store: PersistentStore<String> = PersistentStore::open(&cfg);
            store.set("fen", &"d2d4".to_string(), None).await;
        }

        let store: PersistentStore<String> = PersistentStore::open(&cfg);
        assert_eq!(store.get("fen").await.as_deref(), Some("d2d4"));
        let stats = store.stats().await;
        assert_eq!(stats.size, 1);
        assert!(stats.oldest_entry.is_some());
    }

    #[tokio::test]
    async fn test_stats_reset_by_clear() {
        let store: PersistentStore<i32> = PersistentStore::in_memory(&config(10));
        store.set("a", &1, None).await;
        store.set("b", &2, None).await;

        store.clear().await;
        let stats = store.stats().await;
        assert_eq!(stats.size, 0);
        assert!(stats.oldest_entry.is_none());
    }
}
