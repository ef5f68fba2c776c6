use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::codec::Response;
use crate::error::BepError;

/// The connection's `msg_id -> completion-slot` map (§4.4). `Request`
/// allocates the next id and inserts a slot; a matching `Response` delivers
/// into it; connection close drains every slot with a fatal error.
#[derive(Default)]
pub struct OutstandingRequests {
    slots: Mutex<HashMap<u16, oneshot::Sender<Result<Response, BepError>>>>,
    issued: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new outstanding request for `id`, returning the receiver
    /// its eventual `Response` (or connection-closed error) arrives on.
    ///
    /// Per §4.1, a received id collision with an outstanding request is a
    /// protocol error, so this returns `None` if `id` is already in use.
    pub fn insert(&self, id: u16) -> Option<oneshot::Receiver<Result<Response, BepError>>> {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock().unwrap();
        if slots.contains_key(&id) {
            return None;
        }
        slots.insert(id, tx);
        self.issued.fetch_add(1, Ordering::SeqCst);
        Some(rx)
    }

    /// Delivers a matching `Response`, removing its slot. Returns `false` if
    /// no request with this id is outstanding (a late or spurious reply).
    pub fn complete(&self, id: u16, response: Response) -> bool {
        let slot = self.slots.lock().unwrap().remove(&id);
        match slot {
            Some(tx) => {
                let _ = tx.send(Ok(response));
                self.completed.fetch_add(1, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Drains every outstanding slot with a fatal error, for connection
    /// close or any protocol-level failure.
    pub fn fail_all(&self, err: &BepError) {
        let drained: Vec<_> = {
            let mut slots = self.slots.lock().unwrap();
            slots.drain().collect()
        };
        let count = drained.len() as u64;
        for (_, tx) in drained {
            let _ = tx.send(Err(BepError::Protocol(err.to_string())));
        }
        self.cancelled.fetch_add(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `issued - completed - cancelled`, which the invariant in §8 requires
    /// to always equal [`Self::len`].
    pub fn expected_len(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
            - self.completed.load(Ordering::SeqCst)
            - self.cancelled.load(Ordering::SeqCst)
    }
}
