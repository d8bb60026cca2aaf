//! Ordered write-behind persistence: mutations enqueue records, one task writes them.
//!
//! Records are serialized while the scheduler lock is held, so the store sees
//! writes in mutation order. `flush` waits until everything queued so far is durable.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::config::DownloadConfig;
use crate::model::{DownloadTask, TaskId};
use crate::store::{task_key, KvStore, CONFIG_KEY, TASK_KEY_PREFIX};

enum PersistOp {
    Put(String, Vec<u8>),
    Remove(String),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub(crate) struct Persister {
    tx: mpsc::UnboundedSender<PersistOp>,
}

impl Persister {
    /// Start the writer loop. It ends once every `Persister` clone is dropped.
    pub(crate) fn spawn(store: Arc<dyn KvStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persistence_loop(rx, store));
        Self { tx }
    }

    pub(crate) fn save_task(&self, task: &DownloadTask) {
        match serde_json::to_vec(task) {
            Ok(bytes) => self.send(PersistOp::Put(task_key(&task.id), bytes)),
            Err(e) => tracing::warn!(task = %task.id, "serialize task: {}", e),
        }
    }

    pub(crate) fn remove_task(&self, id: &TaskId) {
        self.send(PersistOp::Remove(task_key(id)));
    }

    pub(crate) fn save_config(&self, cfg: &DownloadConfig) {
        match serde_json::to_vec(cfg) {
            Ok(bytes) => self.send(PersistOp::Put(CONFIG_KEY.to_string(), bytes)),
            Err(e) => tracing::warn!("serialize config: {}", e),
        }
    }

    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(PersistOp::Flush(done_tx));
        let _ = done_rx.await;
    }

    fn send(&self, op: PersistOp) {
        if self.tx.send(op).is_err() {
            tracing::warn!("persistence writer stopped; record dropped");
        }
    }
}

async fn run_persistence_loop(mut rx: mpsc::UnboundedReceiver<PersistOp>, store: Arc<dyn KvStore>) {
    while let Some(op) = rx.recv().await {
        match op {
            PersistOp::Put(key, bytes) => {
                if let Err(e) = store.save(&key, &bytes).await {
                    tracing::warn!(key, "durable save failed: {:#}", e);
                }
            }
            PersistOp::Remove(key) => {
                if let Err(e) = store.remove(&key).await {
                    tracing::warn!(key, "durable remove failed: {:#}", e);
                }
            }
            PersistOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// Read every persisted task. Unreadable records are skipped with a warning.
pub async fn load_tasks(store: &dyn KvStore) -> Result<Vec<DownloadTask>> {
    let keys = store.keys(TASK_KEY_PREFIX).await.context("list task records")?;
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let Some(bytes) = store.load(&key).await? else {
            continue;
        };
        match serde_json::from_slice::<DownloadTask>(&bytes) {
            Ok(task) => out.push(task),
            Err(e) => tracing::warn!(key, "skipping unreadable task record: {}", e),
        }
    }
    Ok(out)
}

/// Read the persisted config record, if any.
pub async fn load_config(store: &dyn KvStore) -> Result<Option<DownloadConfig>> {
    let Some(bytes) = store.load(CONFIG_KEY).await? else {
        return Ok(None);
    };
    let cfg = serde_json::from_slice(&bytes).context("parse persisted config")?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn writes_apply_in_order_and_flush_waits() {
        let store = Arc::new(MemoryStore::new());
        let persister = Persister::spawn(Arc::clone(&store) as Arc<dyn KvStore>);

        let cfg = DownloadConfig {
            max_concurrent_downloads: 7,
            ..DownloadConfig::default()
        };
        persister.save_config(&cfg);
        persister.save_config(&DownloadConfig {
            max_concurrent_downloads: 8,
            ..cfg.clone()
        });
        persister.flush().await;

        let loaded = load_config(store.as_ref()).await.unwrap().unwrap();
        assert_eq!(loaded.max_concurrent_downloads, 8);
    }

    #[tokio::test]
    async fn corrupt_task_record_is_skipped() {
        let store = MemoryStore::new();
        store.save("task:bad", b"not json").await.unwrap();
        let tasks = load_tasks(&store).await.unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn missing_config_is_none() {
        let store = MemoryStore::new();
        assert!(load_config(&store).await.unwrap().is_none());
    }
}
