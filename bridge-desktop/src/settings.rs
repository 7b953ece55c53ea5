//! Settings Storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{SettingsStore, SettingsTransaction},
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

const UPSERT: &str = r#"
    INSERT INTO settings (key, value, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
"#;

/// SQLite-backed settings store implementation
///
/// Values are stored as text; integers are written in decimal so a value set
/// with `set_i64` reads back through `get_string` and vice versa. Every call
/// is a single statement, so readers never see a half-written row, and
/// [`begin_transaction`](SettingsStore::begin_transaction) groups several
/// writes into one SQLite transaction.
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (or create) the settings database at `db_path`
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        // SQLite URLs want forward slashes even on Windows
        let db_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| BridgeError::StorageError(format!("Invalid database path: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to connect to DB: {}", e)))?;

        let store = Self::with_pool(pool).await?;
        debug!(path = ?db_path, "Initialized settings store");
        Ok(store)
    }

    /// Create an in-memory settings store (for testing)
    ///
    /// The pool is pinned to one connection: every SQLite in-memory
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to connect to DB: {}", e)))?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to create table: {}", e)))?;

        Ok(Self { pool })
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Self::now())
            .execute(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to set '{}': {}", key, e)))?;

        debug!(key, bytes = value.len(), "Stored setting");
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to get '{}': {}", key, e)))?;

        Ok(row.map(|row| row.get::<String, _>(0)))
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get_string(key).await? {
            Some(raw) => raw.trim().parse().map(Some).map_err(|e| {
                BridgeError::StorageError(format!("'{}' is not an integer: {}", key, e))
            }),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                BridgeError::StorageError(format!("Failed to delete '{}': {}", key, e))
            })?;

        debug!(key, "Deleted setting");
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to check key: {}", e)))?;

        Ok(row.is_some())
    }

    async fn begin_transaction(&self) -> Result<Box<dyn SettingsTransaction + Send>> {
        let tx = self.pool.begin().await.map_err(|e| {
            BridgeError::StorageError(format!("Failed to begin transaction: {}", e))
        })?;

        Ok(Box::new(SqliteSettingsTransaction { tx: Some(tx) }))
    }
}

/// SQLite settings transaction
///
/// Dropping it without calling `commit` rolls back.
struct SqliteSettingsTransaction {
    tx: Option<sqlx::Transaction<'static, sqlx::Sqlite>>,
}

impl SqliteSettingsTransaction {
    fn active(&mut self) -> Result<&mut sqlx::Transaction<'static, sqlx::Sqlite>> {
        self.tx.as_mut().ok_or_else(|| {
            BridgeError::StorageError("Transaction already finished".to_string())
        })
    }
}

#[async_trait]
impl SettingsTransaction for SqliteSettingsTransaction {
    async fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        let tx = self.active()?;

        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(SqliteSettingsStore::now())
            .execute(&mut **tx)
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to set '{}': {}", key, e)))?;

        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<()> {
        let tx = self.active()?;

        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                BridgeError::StorageError(format!("Failed to delete '{}': {}", key, e))
            })?;

        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let tx = self.tx.take().ok_or_else(|| {
            BridgeError::StorageError("Transaction already finished".to_string())
        })?;

        tx.commit()
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to commit: {}", e)))?;

        debug!("Committed settings transaction");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        let tx = self.tx.take().ok_or_else(|| {
            BridgeError::StorageError("Transaction already finished".to_string())
        })?;

        tx.rollback()
            .await
            .map_err(|e| BridgeError::StorageError(format!("Failed to rollback: {}", e)))?;

        debug!("Rolled back settings transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_string_operations() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("last_sync", "2024-01-01T00:00:00Z").await.unwrap();
        assert_eq!(
            store.get_string("last_sync").await.unwrap().as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert!(store.has_key("last_sync").await.unwrap());

        store.delete("last_sync").await.unwrap();
        assert_eq!(store.get_string("last_sync").await.unwrap(), None);
        assert!(!store.has_key("last_sync").await.unwrap());
    }

    #[tokio::test]
    async fn test_integers_share_text_representation() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_i64("sync_attempts", 2).await.unwrap();
        assert_eq!(store.get_string("sync_attempts").await.unwrap().as_deref(), Some("2"));

        store.set_string("sync_attempts", "3").await.unwrap();
        assert_eq!(store.get_i64("sync_attempts").await.unwrap(), Some(3));

        store.set_string("sync_attempts", "three").await.unwrap();
        assert!(store.get_i64("sync_attempts").await.is_err());
    }

    #[tokio::test]
    async fn test_transaction_commit_applies_all_writes() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_string("stale", "x").await.unwrap();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.set_string("lotto_cache", "{}").await.unwrap();
        tx.set_string("sync_attempts", "0").await.unwrap();
        tx.delete("stale").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_string("lotto_cache").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get_i64("sync_attempts").await.unwrap(), Some(0));
        assert!(!store.has_key("stale").await.unwrap());
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_writes() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();
        store.set_string("lotto_cache", "old").await.unwrap();

        let mut tx = store.begin_transaction().await.unwrap();
        tx.set_string("lotto_cache", "new").await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.get_string("lotto_cache").await.unwrap().as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = std::env::temp_dir().join(format!("lotto-settings-{}", std::process::id()));
        let path = dir.join("settings.db");

        {
            let store = SqliteSettingsStore::new(path.clone()).await.unwrap();
            store.set_string("lotto_cache", "persisted").await.unwrap();
        }

        let reopened = SqliteSettingsStore::new(path).await.unwrap();
        assert_eq!(
            reopened.get_string("lotto_cache").await.unwrap().as_deref(),
            Some("persisted")
        );

        let _ = std::fs::remove_dir_all(dir);
    }
}
