use super::{ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// An in-process object store. Clones share the same contents.
///
#[derive(Debug, Default, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, Vec<u8>>>,
    puts: Arc<AtomicUsize>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many writes this store has received.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// While unavailable, every read and write fails the way an unreachable remote would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        if self.is_unavailable() {
            return Err(ObjectStoreError::Get {
                store: self.describe(),
                key: key.to_string(),
                source: "store is unavailable".into(),
            });
        }
        Ok(self.objects.get(key).map(|blob| blob.value().clone()))
    }

    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<(), ObjectStoreError> {
        if self.is_unavailable() {
            return Err(ObjectStoreError::Put {
                store: self.describe(),
                key: key.to_string(),
                source: "store is unavailable".into(),
            });
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects.insert(key.to_string(), blob);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_keys_are_not_errors() {
        let store = MemoryObjectStore::new();
        assert_matches!(store.get("nope").await, Ok(None));
    }

    #[tokio::test]
    async fn clones_share_contents_and_count_writes() {
        let store = MemoryObjectStore::new();
        let clone = store.clone();
        clone.put("a", b"blob".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some(b"blob".to_vec()));
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.keys(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn an_unavailable_store_rejects_reads_and_writes() {
        let store = MemoryObjectStore::new();
        store.set_unavailable(true);
        assert_matches!(store.get("a").await, Err(ObjectStoreError::Get { .. }));
        assert_matches!(
            store.put("a", b"blob".to_vec()).await,
            Err(ObjectStoreError::Put { .. })
        );
        assert_eq!(store.put_count(), 0);
    }
}
