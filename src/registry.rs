// which conversations opted in with /start

use std::future::Future;
use std::str::FromStr;

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::RegistryError;
use crate::models::ChatId;

/// Persistent set of subscribed chat ids.
///
/// Implementations handle their own synchronization; callers share them
/// behind an `Arc` across handler tasks.
pub trait SubscriberRegistry: Send + Sync + 'static {
    fn insert(&self, id: ChatId) -> impl Future<Output = Result<(), RegistryError>> + Send;

    fn delete(&self, id: ChatId) -> impl Future<Output = Result<(), RegistryError>> + Send;

    fn list(&self) -> impl Future<Output = Result<Vec<ChatId>, RegistryError>> + Send;

    fn exists(&self, id: ChatId) -> impl Future<Output = Result<bool, RegistryError>> + Send;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS subscribers (
    chat_id       INTEGER PRIMARY KEY,
    subscribed_at TEXT NOT NULL
)";

/// SQLite-backed registry.
#[derive(Clone)]
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Connect (creating the database file if needed) and ensure the schema.
    pub async fn connect(database_url: &str) -> Result<Self, RegistryError> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;
        Self::from_pool(pool, database_url).await
    }

    // Each in-memory connection is its own database, so keep exactly one.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, RegistryError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool, "sqlite::memory:").await
    }

    async fn from_pool(pool: SqlitePool, url: &str) -> Result<Self, RegistryError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        info!(database = url, "connected to subscriber store");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl SubscriberRegistry for SqliteRegistry {
    async fn insert(&self, id: ChatId) -> Result<(), RegistryError> {
        sqlx::query(
            "INSERT INTO subscribers (chat_id, subscribed_at) VALUES (?, ?)
             ON CONFLICT(chat_id) DO NOTHING",
        )
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        info!(chat_id = id, "subscriber added");
        Ok(())
    }

    async fn delete(&self, id: ChatId) -> Result<(), RegistryError> {
        let result = sqlx::query("DELETE FROM subscribers WHERE chat_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        info!(chat_id = id, removed = result.rows_affected(), "subscriber removed");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ChatId>, RegistryError> {
        let rows = sqlx::query("SELECT chat_id FROM subscribers")
            .fetch_all(&self.pool)
            .await?;
        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("chat_id"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    async fn exists(&self, id: ChatId) -> Result<bool, RegistryError> {
        let row = sqlx::query("SELECT 1 FROM subscribers WHERE chat_id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_exists_delete() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        assert!(!registry.exists(42).await.unwrap());

        registry.insert(42).await.unwrap();
        assert!(registry.exists(42).await.unwrap());

        registry.delete(42).await.unwrap();
        assert!(!registry.exists(42).await.unwrap());
    }

    #[tokio::test]
    async fn insert_is_idempotent() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        registry.insert(7).await.unwrap();
        registry.insert(7).await.unwrap();
        assert_eq!(registry.list().await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn list_returns_every_subscriber() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        for id in [3, -1001234567890, 12] {
            registry.insert(id).await.unwrap();
        }
        let mut ids = registry.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec![-1001234567890, 3, 12]);
    }

    #[tokio::test]
    async fn delete_unknown_is_not_an_error() {
        let registry = SqliteRegistry::in_memory().await.unwrap();
        registry.delete(99).await.unwrap();
    }
}
