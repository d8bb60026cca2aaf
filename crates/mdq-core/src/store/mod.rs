//! Persistent key/value store used for the task map and the live config.
//!
//! Layout: `task:<id>` holds one JSON `DownloadTask`, `config` holds the JSON
//! `DownloadConfig`. The scheduler never depends on a concrete backend.

mod memory;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key of the persisted `DownloadConfig` record.
pub const CONFIG_KEY: &str = "config";
/// Prefix of persisted task records.
pub const TASK_KEY_PREFIX: &str = "task:";

pub fn task_key(id: &str) -> String {
    format!("{}{}", TASK_KEY_PREFIX, id)
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn save(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Remove `key`; no-op if absent.
    async fn remove(&self, key: &str) -> Result<()>;
    /// All keys starting with `prefix`, in ascending order.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}
