use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::device::DeviceId;
use crate::model::{resolve, FileInfo, Resolution};
use crate::store::BlockStore;

/// Per-folder state: the `(name -> FileInfo)` map plus the device-local
/// monotonic counter and each peer's last-seen `max_local_version`. Single
/// writer discipline (§5) is enforced here with an `RwLock` rather than an
/// actor mailbox, matching a single-process, multi-task deployment; callers
/// needing cross-process coordination own that above this type.
pub struct FolderModel {
    pub id: String,
    files: RwLock<HashMap<String, FileInfo>>,
    local_version: AtomicU64,
    peer_max_local_version: RwLock<HashMap<DeviceId, u64>>,
}

impl FolderModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            files: RwLock::new(HashMap::new()),
            local_version: AtomicU64::new(0),
            peer_max_local_version: RwLock::new(HashMap::new()),
        }
    }

    /// Full snapshot for the initial Index send.
    pub fn local_index(&self) -> Vec<FileInfo> {
        self.files.read().unwrap().values().cloned().collect()
    }

    /// Files whose `local_version` exceeds `since`, for an IndexUpdate.
    pub fn changes_since(&self, since: u64) -> Vec<FileInfo> {
        self.files
            .read()
            .unwrap()
            .values()
            .filter(|f| f.local_version > since)
            .cloned()
            .collect()
    }

    pub fn current_local_version(&self) -> u64 {
        self.local_version.load(Ordering::SeqCst)
    }

    pub fn peer_max_local_version(&self, peer: DeviceId) -> u64 {
        self.peer_max_local_version.read().unwrap().get(&peer).copied().unwrap_or(0)
    }

    pub fn set_peer_max_local_version(&self, peer: DeviceId, version: u64) {
        self.peer_max_local_version.write().unwrap().insert(peer, version);
    }

    /// Inserts a file the external scanner produced directly, bypassing
    /// remote-version resolution (used for locally originated changes).
    pub fn record_local_change(&self, mut file: FileInfo) {
        let next = self.local_version.fetch_add(1, Ordering::SeqCst) + 1;
        file.local_version = next;
        self.files.write().unwrap().insert(file.name.clone(), file);
    }

    /// Applies an Index or IndexUpdate from `peer`: every file is resolved
    /// against the local copy per §3/§4.3's tie-break rules. Returns the
    /// files that were adopted (the caller issues Requests for their
    /// missing blocks). When `replace_all` is true, any locally held file
    /// absent from `files` is left untouched — full replacement of files
    /// not mentioned is the scanner's job, out of scope here.
    pub fn apply_remote_index(
        &self,
        _peer: DeviceId,
        files: Vec<FileInfo>,
        _replace_all: bool,
    ) -> Vec<FileInfo> {
        let mut adopted = Vec::new();
        let mut guard = self.files.write().unwrap();
        for remote in files {
            let resolution = match guard.get(&remote.name) {
                Some(local) => resolve(local, &remote),
                None => Resolution::AdoptRemote,
            };
            if resolution == Resolution::AdoptRemote {
                let next = self.local_version.fetch_add(1, Ordering::SeqCst) + 1;
                let mut adopted_file = remote;
                adopted_file.local_version = next;
                guard.insert(adopted_file.name.clone(), adopted_file.clone());
                adopted.push(adopted_file);
            }
        }
        adopted
    }

    pub fn get(&self, name: &str) -> Option<FileInfo> {
        self.files.read().unwrap().get(name).cloned()
    }

    /// Reads block bytes through to `store`, verifying the requested
    /// `(offset, size, hash)` actually names a block of the named file.
    pub async fn request_block(
        &self,
        store: &dyn BlockStore,
        name: &str,
        offset: u64,
        size: u32,
        hash: &[u8],
    ) -> crate::error::Result<Option<Vec<u8>>> {
        let known = self.files.read().unwrap().get(name).cloned();
        let block_matches = known
            .map(|f| f.blocks.iter().any(|b| b.offset == offset && b.size == size && b.hash == hash))
            .unwrap_or(false);
        if !block_matches {
            return Ok(None);
        }
        store.get(hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockInfo;

    fn file(name: &str, version: u64, modified: i64) -> FileInfo {
        FileInfo {
            name: name.into(),
            flags: 0,
            modified_seconds: modified,
            version,
            local_version: 0,
            blocks: vec![BlockInfo::new(10, vec![1u8; 32])],
        }
    }

    #[test]
    fn apply_remote_index_adopts_newer_files_and_bumps_local_version() {
        let model = FolderModel::new("default");
        let adopted = model.apply_remote_index(DeviceId::LOCAL, vec![file("a.bin", 1, 100)], false);
        assert_eq!(adopted.len(), 1);
        assert_eq!(model.current_local_version(), 1);
        assert_eq!(model.get("a.bin").unwrap().version, 1);
    }

    #[test]
    fn apply_remote_index_skips_files_that_lose_tie_break() {
        let model = FolderModel::new("default");
        model.record_local_change(file("a.bin", 5, 500));
        let before = model.current_local_version();
        let adopted = model.apply_remote_index(DeviceId::LOCAL, vec![file("a.bin", 1, 100)], false);
        assert!(adopted.is_empty());
        assert_eq!(model.current_local_version(), before);
    }

    #[test]
    fn changes_since_only_returns_newer_local_versions() {
        let model = FolderModel::new("default");
        model.record_local_change(file("a.bin", 1, 1));
        model.record_local_change(file("b.bin", 1, 1));
        let since = model.get("a.bin").unwrap().local_version;
        let changes = model.changes_since(since);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].name, "b.bin");
    }

    #[tokio::test]
    async fn request_block_rejects_hash_mismatch() {
        use crate::store::{hash_block, BlockStore, MemoryBlockStore};

        let model = FolderModel::new("default");
        let data = b"block contents";
        let hash = hash_block(data);
        let mut f = file("a.bin", 1, 1);
        f.blocks = vec![BlockInfo { size: data.len() as u32, hash: hash.clone(), offset: 0 }];
        model.apply_remote_index(DeviceId::LOCAL, vec![f], false);

        let store = MemoryBlockStore::new();
        store.put(&hash, data.to_vec()).await.unwrap();

        let wrong_hash = vec![0u8; 32];
        let result = model
            .request_block(&store, "a.bin", 0, data.len() as u32, &wrong_hash)
            .await
            .unwrap();
        assert_eq!(result, None);

        let result = model
            .request_block(&store, "a.bin", 0, data.len() as u32, &hash)
            .await
            .unwrap();
        assert_eq!(result, Some(data.to_vec()));
    }
}
