use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::BlockStore;
use crate::error::Result;

/// An in-memory `BlockStore`, suitable for tests and for small, ephemeral
/// deployments. Guarded by a single mutex; the store does not expose
/// iteration or ordering, so lock contention is the only cost of this
/// simplicity.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    meta: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn get(&self, hash: &[u8]) -> Result<Option<Vec<u8>>> {
        if hash.is_empty() {
            return Ok(None);
        }
        Ok(self.blocks.lock().unwrap().get(hash).cloned())
    }

    async fn put(&self, hash: &[u8], data: Vec<u8>) -> Result<()> {
        let mut blocks = self.blocks.lock().unwrap();
        blocks.entry(hash.to_vec()).or_insert(data);
        Ok(())
    }

    async fn delete(&self, hash: &[u8]) -> Result<()> {
        self.blocks.lock().unwrap().remove(hash);
        Ok(())
    }

    async fn get_meta(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.meta.lock().unwrap().get(name).cloned())
    }

    async fn set_meta(&self, name: &str, data: Vec<u8>) -> Result<()> {
        self.meta.lock().unwrap().insert(name.to_string(), data);
        Ok(())
    }

    async fn delete_meta(&self, name: &str) -> Result<()> {
        self.meta.lock().unwrap().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{hash_block, verify_hash};

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryBlockStore::new();
        let data = b"hello block".to_vec();
        let hash = hash_block(&data);
        store.put(&hash, data.clone()).await.unwrap();
        assert_eq!(store.get(&hash).await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn missing_hash_returns_none() {
        let store = MemoryBlockStore::new();
        assert_eq!(store.get(&[1, 2, 3]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_hash_returns_none() {
        let store = MemoryBlockStore::new();
        store.put(&[], b"should never be reachable".to_vec()).await.unwrap();
        assert_eq!(store.get(&[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_is_idempotent_first_write_wins() {
        let store = MemoryBlockStore::new();
        let hash = hash_block(b"first");
        store.put(&hash, b"first".to_vec()).await.unwrap();
        store.put(&hash, b"second".to_vec()).await.unwrap();
        assert_eq!(store.get(&hash).await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn delete_removes_block() {
        let store = MemoryBlockStore::new();
        let hash = hash_block(b"gone");
        store.put(&hash, b"gone".to_vec()).await.unwrap();
        store.delete(&hash).await.unwrap();
        assert_eq!(store.get(&hash).await.unwrap(), None);
    }

    #[tokio::test]
    async fn meta_namespace_is_independent_of_blocks() {
        let store = MemoryBlockStore::new();
        store.set_meta("folder-index", b"snapshot".to_vec()).await.unwrap();
        assert_eq!(
            store.get_meta("folder-index").await.unwrap(),
            Some(b"snapshot".to_vec())
        );
        assert_eq!(store.get(b"folder-index").await.unwrap(), None);
    }

    #[test]
    fn verify_hash_detects_mismatch() {
        let data = b"content";
        assert!(verify_hash(&hash_block(data), data));
        assert!(!verify_hash(&hash_block(data), b"other"));
    }
}
