use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use super::bep_connection::BepConnection;
use crate::device::DeviceId;

/// Tracks the set of live peer connections and the shared active-connection
/// counter the teacher's graceful-shutdown idiom decrements on drop.
pub struct ConnectionManager {
    connections: RwLock<HashMap<DeviceId, Arc<BepConnection>>>,
    active: Arc<AtomicUsize>,
    idle_tx: watch::Sender<()>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        let (idle_tx, _idle_rx) = watch::channel(());
        Self { connections: RwLock::new(HashMap::new()), active: Arc::new(AtomicUsize::new(0)), idle_tx }
    }

    pub fn active_counter(&self) -> Arc<AtomicUsize> {
        self.active.clone()
    }

    pub fn idle_notifier(&self) -> watch::Sender<()> {
        self.idle_tx.clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn insert(&self, conn: Arc<BepConnection>) {
        self.connections.write().unwrap().insert(conn.peer_id, conn);
    }

    pub fn remove(&self, peer: DeviceId) {
        self.connections.write().unwrap().remove(&peer);
    }

    pub fn get(&self, peer: DeviceId) -> Option<Arc<BepConnection>> {
        self.connections.read().unwrap().get(&peer).cloned()
    }

    pub fn connected_peers(&self) -> Vec<DeviceId> {
        self.connections.read().unwrap().keys().copied().collect()
    }

    /// Subscribes to the "all connections drained" signal used during
    /// graceful shutdown.
    pub fn subscribe_idle(&self) -> watch::Receiver<()> {
        self.idle_tx.subscribe()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
