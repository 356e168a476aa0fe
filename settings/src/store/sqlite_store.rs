//! SQLite-backed settings: one row per settings key, value stored as JSON.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use super::SettingsStore;
use crate::error::PersistenceError;
use crate::model::EngineSettings;

pub struct SqliteSettingsStore {
    pool: SqlitePool,
    key: String,
}

impl SqliteSettingsStore {
    /// Wraps an existing pool. The schema must already exist; see
    /// [`ensure_schema`](Self::ensure_schema).
    pub fn from_pool(pool: SqlitePool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }

    /// Connects and creates the table if missing.
    pub async fn connect(url: &str, key: impl Into<String>) -> Result<Self, PersistenceError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        let store = Self::from_pool(pool, key);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    #[instrument(skip(self), fields(key = %self.key))]
    async fn load(&self) -> Result<Option<EngineSettings>, PersistenceError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: String = row.try_get("value")?;
        Ok(Some(serde_json::from_str(&value)?))
    }

    #[instrument(skip(self), fields(key = %self.key))]
    async fn save(&self, settings: &EngineSettings) -> Result<(), PersistenceError> {
        let value = serde_json::to_string(settings)?;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        )
        .bind(&self.key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
