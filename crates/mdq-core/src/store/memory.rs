//! In-process store; contents vanish with the process.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::KvStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.map.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.map().get(key).cloned())
    }

    async fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        self.map().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map().remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .map()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_remove_keys() {
        let store = MemoryStore::new();
        assert!(store.load("a").await.unwrap().is_none());
        store.save("task:2", b"two").await.unwrap();
        store.save("task:1", b"one").await.unwrap();
        store.save("config", b"{}").await.unwrap();
        assert_eq!(store.load("task:1").await.unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(store.keys("task:").await.unwrap(), ["task:1", "task:2"]);
        store.remove("task:1").await.unwrap();
        store.remove("task:1").await.unwrap();
        assert_eq!(store.keys("task:").await.unwrap(), ["task:2"]);
    }
}
