use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheError, CacheStore};

/// Process-local store; used when no cache database is configured.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::sample_entry;

    #[tokio::test]
    async fn get_miss_creates_nothing() {
        let store = MemoryCacheStore::new();
        assert!(store.get("ISBN:0743273567").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn put_is_last_write_wins() {
        let store = MemoryCacheStore::new();
        let mut entry = sample_entry("ISBN:0743273567");
        store.put(&entry).await.unwrap();
        entry.message = "second".into();
        store.put(&entry).await.unwrap();

        let got = store.get("ISBN:0743273567").await.unwrap().unwrap();
        assert_eq!(got.message, "second");
        assert_eq!(store.len().await, 1);

        assert!(store.remove("ISBN:0743273567").await.unwrap());
        assert!(!store.remove("ISBN:0743273567").await.unwrap());
    }
}
