//! Local key-value storage for client state.
//!
//! The client persists exactly two things between runs: the bearer token and
//! the route context of the current journey. Both live behind the
//! [`KeyValueStore`] capability so the session and route cache can be handed
//! an in-memory store in tests instead of touching disk.
//!
//! Both are best-effort caches. Losing them means signing in again and sending
//! SOS alerts without route details, nothing worse.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// A persistent string slot store.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    /// Read a slot. `Ok(None)` when it was never written or has been removed.
    fn get(&self, key: &str) -> impl Future<Output = anyhow::Result<Option<String>>> + Send;

    /// Write a slot, replacing any previous value.
    fn put(&self, key: &str, value: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Remove a slot. Removing a missing slot is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open the store and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:safenav.db?mode=rwc" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every connection to an in-memory database gets its own database.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        Ok(store)
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT value FROM kv_slots WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_slots (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM kv_slots WHERE key = ?
            "#,
        )
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Process-local store. Clones share the same slots.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> anyhow::Result<T> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(f(&mut slots))
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.with_slots(|slots| slots.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.with_slots(|slots| {
            slots.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.with_slots(|slots| {
            slots.remove(key);
        })
    }
}
