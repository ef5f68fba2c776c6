//! Inbound BEP connections: accept, TLS handshake, derive the peer's
//! [`DeviceId`] from its certificate, then hand off to [`bep_core::spawn`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bep_core::folder::FolderRegistry;
use bep_core::store::BlockStore;
use bep_core::telemetry::Metrics;
use bep_core::{spawn, BepError, ConnectionManager, DeviceId, PingConfig, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[allow(clippy::too_many_arguments)]
pub async fn run(
    listen: SocketAddr,
    acceptor: TlsAcceptor,
    folders: Arc<FolderRegistry>,
    store: Arc<dyn BlockStore>,
    ping_config: PingConfig,
    handshake_timeout: Duration,
    manager: Arc<ConnectionManager>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(listen).await.map_err(BepError::Io)?;
    info!(%listen, "listening for BEP connections");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted.map_err(BepError::Io)?;
                let acceptor = acceptor.clone();
                let folders = folders.clone();
                let store = store.clone();
                let manager = manager.clone();
                let metrics = metrics.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if let Err(err) = accept_one(
                        stream, acceptor, folders, store, ping_config, handshake_timeout, manager, metrics.clone(), cancel,
                    )
                    .await
                    {
                        metrics.connection_errors_total.add(1, &[]);
                        warn!(%peer_addr, error = %err, "inbound connection failed");
                    }
                });
            }
            _ = cancel.cancelled() => {
                info!("listener shutting down");
                return Ok(());
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn accept_one(
    stream: TcpStream,
    acceptor: TlsAcceptor,
    folders: Arc<FolderRegistry>,
    store: Arc<dyn BlockStore>,
    ping_config: PingConfig,
    handshake_timeout: Duration,
    manager: Arc<ConnectionManager>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let peer_addr = stream.peer_addr().map_err(BepError::Io)?;
    let tls_stream = tokio::time::timeout(handshake_timeout, acceptor.accept(stream))
        .await
        .map_err(|_| BepError::Temporary("TLS handshake timed out".into()))?
        .map_err(|e| BepError::Tls(e.to_string()))?;

    let peer_id = peer_device_id(tls_stream.get_ref().1.peer_certificates())?;
    info!(%peer_addr, %peer_id, "accepted BEP connection");

    let (conn, joined) = spawn(tls_stream, peer_id, folders, store, ping_config, cancel);
    manager.insert(conn);
    metrics.connections_total.add(1, &[]);
    metrics.connections_active.add(1, &[]);
    let _ = joined.await;
    manager.remove(peer_id);
    metrics.connections_active.add(-1, &[]);
    Ok(())
}

fn peer_device_id(certs: Option<&[tokio_rustls::rustls::pki_types::CertificateDer<'_>]>) -> Result<DeviceId> {
    let certs = certs.ok_or_else(|| BepError::Tls("peer presented no certificate".into()))?;
    let leaf = certs.first().ok_or(BepError::NoCertificates)?;
    Ok(DeviceId::from_certificate_der(leaf.as_ref()))
}
