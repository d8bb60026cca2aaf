//! SQLite-backed key/value store (sqlx).
//!
//! The database file lives under the XDG state directory:
//! `~/.local/state/mdq/tasks.db` on Debian.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::KvStore;
use crate::paths;

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (or create) the default store and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(paths::default_store_path()?).await
    }

    /// Open (or create) the store at a specific path in WAL mode, so `mdq status`
    /// can read while `mdq run` writes. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create state dir: {}", parent.display()))?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("open store: {}", path.display()))?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory database. Single connection so the pool never hands back a different empty DB.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<Vec<u8>, _>("value")))
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                           updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM kv
            WHERE substr(key, 1, length(?1)) = ?1
            ORDER BY key ASC
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("key")).collect())
    }
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_and_prefix_keys() {
        let store = SqliteStore::open_memory().await.unwrap();
        store.save("task:b", b"1").await.unwrap();
        store.save("task:a", b"2").await.unwrap();
        store.save("task:a", b"3").await.unwrap();
        store.save("config", b"{}").await.unwrap();

        assert_eq!(store.load("task:a").await.unwrap().as_deref(), Some(&b"3"[..]));
        assert_eq!(store.keys("task:").await.unwrap(), ["task:a", "task:b"]);
        assert_eq!(store.keys("").await.unwrap().len(), 3);

        store.remove("task:a").await.unwrap();
        assert!(store.load("task:a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn open_at_path_with_spaces_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state dir").join("tasks.db");
        {
            let store = SqliteStore::open_at(&path).await.unwrap();
            store.save("config", b"x").await.unwrap();
        }
        let store = SqliteStore::open_at(&path).await.unwrap();
        assert_eq!(store.load("config").await.unwrap().as_deref(), Some(&b"x"[..]));
    }

    #[tokio::test]
    async fn file_store_uses_write_ahead_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open_at(dir.path().join("tasks.db")).await.unwrap();
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(mode.to_ascii_lowercase(), "wal");

        store.save("task:a", b"1").await.unwrap();
        let reader = SqliteStore::open_at(dir.path().join("tasks.db")).await.unwrap();
        assert_eq!(reader.keys("task:").await.unwrap(), ["task:a"]);
    }
}
