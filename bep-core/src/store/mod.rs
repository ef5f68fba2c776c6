//! The content-addressed block store: §4.2. A pure key/value surface over
//! block-hash bytes, plus a small "meta" namespace for snapshots the folder
//! model persists (e.g. index checkpoints).

mod memory;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

pub use memory::MemoryBlockStore;

/// Content-addressed block storage, keyed by raw SHA-256 hash bytes.
///
/// Implementations MUST return byte-exact content from `get` and MUST treat
/// `put` as idempotent. The trait says nothing about durability; callers
/// that need it pick an implementation that provides it.
#[async_trait]
pub trait BlockStore: Send + Sync {
    async fn get(&self, hash: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores `data` under `hash`. Implementations MAY skip the write when
    /// the hash is already present.
    async fn put(&self, hash: &[u8], data: Vec<u8>) -> Result<()>;

    /// Best-effort removal; callers must not rely on this for security.
    async fn delete(&self, hash: &[u8]) -> Result<()>;

    async fn get_meta(&self, name: &str) -> Result<Option<Vec<u8>>>;
    async fn set_meta(&self, name: &str, data: Vec<u8>) -> Result<()>;
    async fn delete_meta(&self, name: &str) -> Result<()>;
}

/// Hashes `data` with SHA-256, the block store's key algorithm.
pub fn hash_block(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}

/// Verifies `data` hashes to `expected`; the store's own guard against
/// callers handing it content that doesn't match the key they claim for it.
pub fn verify_hash(expected: &[u8], data: &[u8]) -> bool {
    hash_block(data) == expected
}
