use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::outstanding::OutstandingRequests;
use super::state::ConnectionState;
use crate::codec::{BepCodec, Frame, Message, MessageIdAllocator, Request, Response};
use crate::device::DeviceId;
use crate::error::{BepError, Result};
use crate::folder::FolderRegistry;
use crate::model::{ClusterConfig, IndexMessage};
use crate::store::BlockStore;

/// Ping/pong timing, configurable per §4.4 and §5 ("pingIdleTime ≈5 min,
/// pingTimeout ≈2 min").
#[derive(Debug, Clone, Copy)]
pub struct PingConfig {
    pub idle: Duration,
    pub timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self { idle: Duration::from_secs(5 * 60), timeout: Duration::from_secs(2 * 60) }
    }
}

/// The reader/writer/pinger task triad's shared mailbox and bookkeeping for
/// one BEP peer connection (§4.4, §9 "coroutine control flow"). The outbound
/// byte stream is serialized entirely by the writer task draining this
/// struct's `mpsc` channel, so producers (request issuers, response
/// emitters, the pinger) never need their own lock to preserve frame order.
pub struct BepConnection {
    pub peer_id: DeviceId,
    outbound: mpsc::Sender<Frame>,
    outstanding: Arc<OutstandingRequests>,
    id_alloc: Mutex<MessageIdAllocator>,
    state: Mutex<ConnectionState>,
    cancel: CancellationToken,
}

impl BepConnection {
    fn next_id(&self) -> u16 {
        self.id_alloc.lock().unwrap().next()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, to: ConnectionState) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state = state.transition(to)?;
        Ok(())
    }

    async fn enqueue(&self, id: u16, message: Message) -> Result<()> {
        self.outbound
            .send(Frame { id, message })
            .await
            .map_err(|_| BepError::ConnectionClosed)
    }

    pub async fn send_cluster_config(&self, cc: ClusterConfig) -> Result<()> {
        let id = self.next_id();
        self.enqueue(id, Message::ClusterConfig(cc)).await
    }

    pub async fn send_index(&self, idx: IndexMessage) -> Result<()> {
        let id = self.next_id();
        self.enqueue(id, Message::Index(idx)).await
    }

    pub async fn send_index_update(&self, idx: IndexMessage) -> Result<()> {
        let id = self.next_id();
        self.enqueue(id, Message::IndexUpdate(idx)).await
    }

    /// Issues a block `Request` and awaits its matching `Response`.
    pub async fn request(&self, req: Request) -> Result<Response> {
        let id = self.next_id();
        let rx = self
            .outstanding
            .insert(id)
            .ok_or_else(|| BepError::Protocol(format!("message id {id} already outstanding")))?;
        self.enqueue(id, Message::Request(req)).await?;
        rx.await.map_err(|_| BepError::ConnectionClosed)?
    }

    /// Sends `Close` and marks the connection terminal; no further outbound
    /// messages are permitted afterward (the caller must drop the handle).
    pub async fn close(&self, reason: impl Into<String>) -> Result<()> {
        let id = self.next_id();
        self.enqueue(id, Message::Close(crate::codec::Close { reason: reason.into() })).await?;
        self.set_state(ConnectionState::Closed)?;
        self.cancel.cancel();
        Ok(())
    }

    pub fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }
}

/// Spawns the reader, writer, and pinger tasks for one accepted or dialed
/// BEP connection and returns a handle plus a future that resolves when all
/// three have exited (cleanly or otherwise).
pub fn spawn<S>(
    stream: S,
    peer_id: DeviceId,
    folders: Arc<FolderRegistry>,
    store: Arc<dyn BlockStore>,
    ping_config: PingConfig,
    cancel: CancellationToken,
) -> (Arc<BepConnection>, tokio::task::JoinHandle<()>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let framed = Framed::new(stream, BepCodec::default());
    let (sink, stream) = framed.split();

    let (outbound_tx, outbound_rx) = mpsc::channel(256);
    let outstanding = Arc::new(OutstandingRequests::new());

    let conn = Arc::new(BepConnection {
        peer_id,
        outbound: outbound_tx.clone(),
        outstanding: outstanding.clone(),
        id_alloc: Mutex::new(MessageIdAllocator::default()),
        // The TLS handshake and post-handshake device-id check (§4.4) have
        // already happened by the time a stream reaches `spawn`, so the
        // connection starts life past `New`, waiting for the first
        // `ClusterConfig` in either direction.
        state: Mutex::new(ConnectionState::HelloPending),
        cancel: cancel.clone(),
    });

    let last_activity = Arc::new(AtomicU64::new(0));

    let writer = tokio::spawn(run_writer(sink, outbound_rx, cancel.clone()));
    let reader = tokio::spawn(run_reader(
        stream,
        conn.clone(),
        folders,
        store,
        outbound_tx,
        last_activity.clone(),
        cancel.clone(),
    ));
    let pinger = tokio::spawn(run_pinger(conn.clone(), ping_config, last_activity, cancel.clone()));

    let joined = tokio::spawn(async move {
        let _ = tokio::join!(writer, reader, pinger);
    });

    (conn, joined)
}

async fn run_writer<Sink>(
    mut sink: Sink,
    mut outbound_rx: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
) where
    Sink: futures_util::Sink<Frame, Error = BepError> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(err) = sink.send(frame).await {
                            warn!(error = %err, "write failed, closing connection");
                            cancel.cancel();
                            return;
                        }
                    }
                    None => return,
                }
            }
        }
    }
}

async fn run_reader<St>(
    mut stream: St,
    conn: Arc<BepConnection>,
    folders: Arc<FolderRegistry>,
    store: Arc<dyn BlockStore>,
    outbound_tx: mpsc::Sender<Frame>,
    last_activity: Arc<AtomicU64>,
    cancel: CancellationToken,
) where
    St: futures_util::Stream<Item = Result<Frame>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = stream.next() => frame,
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                warn!(error = %err, peer = %conn.peer_id, "fatal protocol error, closing connection");
                conn.outstanding.fail_all(&err);
                let _ = conn.set_state(ConnectionState::Closed);
                cancel.cancel();
                return;
            }
            None => {
                debug!(peer = %conn.peer_id, "peer closed the connection");
                conn.outstanding.fail_all(&BepError::ConnectionClosed);
                let _ = conn.set_state(ConnectionState::Closed);
                cancel.cancel();
                return;
            }
        };

        last_activity.store(now_millis(), Ordering::SeqCst);

        match frame.message {
            Message::ClusterConfig(_) => {
                if conn.set_state(ConnectionState::IndexPending).is_err() {
                    warn!("ClusterConfig received out of order");
                    conn.outstanding.fail_all(&BepError::Protocol("unexpected ClusterConfig".into()));
                    let _ = conn.set_state(ConnectionState::Closed);
                    cancel.cancel();
                    return;
                }
            }
            Message::Index(idx) | Message::IndexUpdate(idx) => {
                let current = conn.state();
                if current == ConnectionState::HelloPending {
                    warn!(peer = %conn.peer_id, "Index received before ClusterConfig, closing connection");
                    conn.outstanding.fail_all(&BepError::Protocol("Index received before ClusterConfig".into()));
                    let _ = conn.set_state(ConnectionState::Closed);
                    cancel.cancel();
                    return;
                }
                let folder = folders.get_or_create(&idx.folder_id);
                folder.apply_remote_index(conn.peer_id, idx.files, false);
                if current == ConnectionState::IndexPending {
                    let _ = conn.set_state(ConnectionState::Steady);
                }
            }
            Message::Request(req) => {
                if conn.state() == ConnectionState::HelloPending {
                    warn!(peer = %conn.peer_id, "Request received before ClusterConfig, closing connection");
                    conn.outstanding.fail_all(&BepError::Protocol("Request received before ClusterConfig".into()));
                    let _ = conn.set_state(ConnectionState::Closed);
                    cancel.cancel();
                    return;
                }
                let data = match folders.get(&req.folder) {
                    Some(folder) => folder
                        .request_block(store.as_ref(), &req.name, req.offset, req.size, &req.hash)
                        .await
                        .unwrap_or(None),
                    None => None,
                };
                let response = Response { data: data.unwrap_or_default() };
                let _ = outbound_tx.send(Frame { id: frame.id, message: Message::Response(response) }).await;
            }
            Message::Response(resp) => {
                conn.outstanding.complete(frame.id, resp);
            }
            Message::Ping => {
                if conn.state() == ConnectionState::HelloPending {
                    warn!(peer = %conn.peer_id, "Ping received before ClusterConfig, closing connection");
                    conn.outstanding.fail_all(&BepError::Protocol("Ping received before ClusterConfig".into()));
                    let _ = conn.set_state(ConnectionState::Closed);
                    cancel.cancel();
                    return;
                }
                let _ = outbound_tx.send(Frame { id: frame.id, message: Message::Pong }).await;
            }
            Message::Pong => {
                // Pong receipt alone clears the ping deadline via last_activity above.
            }
            Message::Close(close) => {
                info!(peer = %conn.peer_id, reason = %close.reason, "peer sent Close");
                conn.outstanding.fail_all(&BepError::ConnectionClosed);
                let _ = conn.set_state(ConnectionState::Closed);
                cancel.cancel();
                return;
            }
        }
    }
}

async fn run_pinger(
    conn: Arc<BepConnection>,
    config: PingConfig,
    last_activity: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    last_activity.store(now_millis(), Ordering::SeqCst);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.idle) => {}
        }

        if !conn.state().is_steady() {
            continue;
        }

        let idle_for = now_millis().saturating_sub(last_activity.load(Ordering::SeqCst));
        if idle_for < config.idle.as_millis() as u64 {
            continue;
        }

        let id = conn.next_id();
        if conn.enqueue(id, Message::Ping).await.is_err() {
            return;
        }

        let before = last_activity.load(Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.timeout) => {
                if last_activity.load(Ordering::SeqCst) == before {
                    warn!(peer = %conn.peer_id, "ping timeout, closing connection");
                    conn.outstanding.fail_all(&BepError::Transport("ping timeout".into()));
                    let _ = conn.set_state(ConnectionState::Closed);
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlockStore;
    use tokio::io::duplex;

    #[tokio::test]
    async fn basic_handshake_reaches_steady_and_serves_a_request() {
        let folders_a = Arc::new(FolderRegistry::new());
        let folders_b = Arc::new(FolderRegistry::new());
        let store_a = Arc::new(MemoryBlockStore::new()) as Arc<dyn BlockStore>;
        let store_b = Arc::new(MemoryBlockStore::new()) as Arc<dyn BlockStore>;

        let data = b"hello from A".to_vec();
        let hash = crate::store::hash_block(&data);
        store_a.put(&hash, data.clone()).await.unwrap();

        let file = crate::model::FileInfo {
            name: "foo.bin".into(),
            flags: 0,
            modified_seconds: 1,
            version: 1,
            local_version: 0,
            blocks: vec![crate::model::BlockInfo { size: data.len() as u32, hash: hash.clone(), offset: 0 }],
        };
        folders_a.get_or_create("default").record_local_change(file);

        let (stream_a, stream_b) = duplex(64 * 1024);
        let cancel = CancellationToken::new();

        let (conn_a, _handle_a) = spawn(
            stream_a,
            DeviceId::from_bytes([1u8; 32]),
            folders_a.clone(),
            store_a,
            PingConfig { idle: Duration::from_secs(600), timeout: Duration::from_secs(600) },
            cancel.clone(),
        );
        let (conn_b, _handle_b) = spawn(
            stream_b,
            DeviceId::from_bytes([2u8; 32]),
            folders_b.clone(),
            store_b,
            PingConfig { idle: Duration::from_secs(600), timeout: Duration::from_secs(600) },
            cancel.clone(),
        );

        conn_a
            .send_cluster_config(ClusterConfig {
                client_name: "a".into(),
                client_version: "1".into(),
                folders: vec![],
                options: vec![],
            })
            .await
            .unwrap();
        conn_b
            .send_cluster_config(ClusterConfig {
                client_name: "b".into(),
                client_version: "1".into(),
                folders: vec![],
                options: vec![],
            })
            .await
            .unwrap();

        let local_files = folders_a.get_or_create("default").local_index();
        conn_a
            .send_index(IndexMessage { folder_id: "default".into(), files: local_files })
            .await
            .unwrap();
        conn_b.send_index(IndexMessage { folder_id: "default".into(), files: vec![] }).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = conn_b
            .request(Request { folder: "default".into(), name: "foo.bin".into(), offset: 0, size: data.len() as u32, hash })
            .await
            .unwrap();
        assert_eq!(response.data, data);

        cancel.cancel();
    }
}
