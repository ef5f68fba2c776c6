//! Outbound BEP connections to statically-configured known devices (§6,
//! "known devices"). Discovery-resolved addresses are out of scope here;
//! the LAN beacon and NAT mapping service run independently of per-peer
//! connections, per the design.

use std::sync::Arc;
use std::time::Duration;

use bep_core::config::KnownDevice;
use bep_core::folder::FolderRegistry;
use bep_core::store::BlockStore;
use bep_core::telemetry::Metrics;
use bep_core::{spawn, BepError, ConnectionManager, DeviceId, PingConfig, Result};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One pass over `known.addresses`, stopping at the first address that
/// completes a handshake with the expected device id. Intended to be driven
/// under a [`bep_core::Supervisor`] so a dead peer is retried with backoff.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    known: KnownDevice,
    connector: TlsConnector,
    folders: Arc<FolderRegistry>,
    store: Arc<dyn BlockStore>,
    ping_config: PingConfig,
    handshake_timeout: Duration,
    manager: Arc<ConnectionManager>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> Result<()> {
    let expected =
        DeviceId::parse(&known.id).map_err(|e| BepError::Config(format!("invalid known device id: {e}")))?;

    if known.addresses.is_empty() {
        return Ok(());
    }
    if manager.get(expected).is_some() {
        return Ok(());
    }

    let mut last_err = None;
    for address in &known.addresses {
        match dial_one(address, expected, &connector, handshake_timeout).await {
            Ok(stream) => {
                info!(%address, %expected, "dialed BEP peer");
                let (conn, joined) = spawn(stream, expected, folders, store, ping_config, cancel);
                manager.insert(conn);
                metrics.connections_total.add(1, &[]);
                metrics.connections_active.add(1, &[]);
                let _ = joined.await;
                manager.remove(expected);
                metrics.connections_active.add(-1, &[]);
                return Ok(());
            }
            Err(err) => {
                metrics.connection_errors_total.add(1, &[]);
                warn!(%address, error = %err, "dial attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| BepError::Temporary(format!("no reachable address for device {expected}"))))
}

async fn dial_one(
    address: &str,
    expected: DeviceId,
    connector: &TlsConnector,
    handshake_timeout: Duration,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let addr: std::net::SocketAddr =
        address.parse().map_err(|e| BepError::Config(format!("invalid dial address '{address}': {e}")))?;
    let tcp = TcpStream::connect(addr).await.map_err(BepError::Io)?;
    let server_name = tokio_rustls::rustls::pki_types::ServerName::IpAddress(addr.ip().into());

    let tls = tokio::time::timeout(handshake_timeout, connector.connect(server_name, tcp))
        .await
        .map_err(|_| BepError::Temporary("TLS handshake timed out".into()))?
        .map_err(|e| BepError::Tls(e.to_string()))?;

    let (_, session) = tls.get_ref();
    let certs = session.peer_certificates().ok_or_else(|| BepError::Tls("peer presented no certificate".into()))?;
    let leaf = certs.first().ok_or(BepError::NoCertificates)?;
    let peer_id = DeviceId::from_certificate_der(leaf.as_ref());
    if peer_id != expected {
        return Err(BepError::DeviceId(format!("dialed device id mismatch: expected {expected}, got {peer_id}")));
    }

    Ok(tls)
}
