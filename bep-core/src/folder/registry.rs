use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::FolderModel;

/// The set of folders a device hosts, keyed by folder id. New folders are
/// created lazily on first reference (e.g. an inbound ClusterConfig naming
/// one we don't yet track) rather than requiring up-front registration.
#[derive(Default)]
pub struct FolderRegistry {
    folders: RwLock<HashMap<String, Arc<FolderModel>>>,
}

impl FolderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, folder_id: &str) -> Arc<FolderModel> {
        if let Some(existing) = self.folders.read().unwrap().get(folder_id) {
            return existing.clone();
        }
        let mut folders = self.folders.write().unwrap();
        folders
            .entry(folder_id.to_string())
            .or_insert_with(|| Arc::new(FolderModel::new(folder_id)))
            .clone()
    }

    pub fn get(&self, folder_id: &str) -> Option<Arc<FolderModel>> {
        self.folders.read().unwrap().get(folder_id).cloned()
    }

    pub fn folder_ids(&self) -> Vec<String> {
        self.folders.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_returns_the_same_instance() {
        let registry = FolderRegistry::new();
        let a = registry.get_or_create("default");
        let b = registry.get_or_create("default");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_folder_is_none_until_created() {
        let registry = FolderRegistry::new();
        assert!(registry.get("default").is_none());
        registry.get_or_create("default");
        assert!(registry.get("default").is_some());
    }
}
