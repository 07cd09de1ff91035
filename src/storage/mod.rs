//! Key-value persistence for connection settings.
//!
//! The configuration store only needs string keys and string values, so the
//! backend is hidden behind [`KeyValueStore`]. `SqliteStore` is the durable
//! backend; `MemoryStore` keeps everything in-process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ApiResult;

/// Storage backend for persisted settings
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Absence is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> ApiResult<Option<String>>;

    /// Insert or overwrite a value
    async fn set(&self, key: &str, value: &str) -> ApiResult<()>;

    /// Delete a value. Removing a missing key is a no-op.
    async fn remove(&self, key: &str) -> ApiResult<()>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_url` and run migrations
    pub async fn open(db_url: &str) -> ApiResult<Self> {
        let in_memory = db_url.contains(":memory:");

        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            info!("Creating settings database at {}", db_url);
            Sqlite::create_database(db_url).await?;
        }

        // Every connection to :memory: is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect(db_url)
            .await?;

        info!("Running settings migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> ApiResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        sqlx::query(
            r"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl Clone for SqliteStore {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

/// In-process store; clones share the same map
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> ApiResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> ApiResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
