//! Wires the LAN beacon (§4.6) to this device's own announcement: a
//! periodic sender plus a receive loop that logs discovered peers. Reader
//! and writer casters each run under their own [`Supervisor`], matching the
//! "restart on failure, cap restarts, propagate past the cap" policy the
//! rest of the node's long-lived services use.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bep_core::beacon::{bind_reuseaddr, BeaconReader, BeaconWriter, Ipv4Broadcaster, Ipv6Multicaster};
use bep_core::codec::discovery::{Address, Announcement, Device};
use bep_core::telemetry::Metrics;
use bep_core::{DeviceId, Result, Supervisor};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The supervisors backing the beacon's reader/writer tasks, kept around so
/// shutdown can cancel them explicitly.
pub struct BeaconHandles {
    pub supervisors: Vec<Arc<Supervisor>>,
}

impl BeaconHandles {
    pub fn shutdown(&self) {
        for supervisor in &self.supervisors {
            supervisor.cancel();
        }
    }
}

fn supervise_reader(reader: BeaconReader) -> Arc<Supervisor> {
    let supervisor = Arc::new(Supervisor::new());
    let spawned = supervisor.clone();
    tokio::spawn(async move {
        spawned.run(|cancel| { let reader = &reader; async move { reader.run(cancel).await } }).await;
    });
    supervisor
}

fn supervise_writer<S: bep_core::beacon::Caster + Send + Sync + 'static>(
    writer: BeaconWriter<S>,
    metrics: Arc<Metrics>,
) -> Arc<Supervisor> {
    let supervisor = Arc::new(Supervisor::new());
    let spawned = supervisor.clone();
    tokio::spawn(async move {
        spawned
            .run(|cancel| {
                let writer = &writer;
                let metrics = metrics.clone();
                async move {
                    let result = writer.run(cancel).await;
                    if result.is_err() {
                        metrics.beacon_send_failures_total.add(1, &[]);
                    }
                    result
                }
            })
            .await;
    });
    supervisor
}

/// Starts the reader, both writer casters, the periodic announcer, and the
/// discovered-peer logger. `shutdown` governs only the (unsupervised)
/// periodic announce loop; reader/writer lifecycles are controlled via the
/// returned [`BeaconHandles`].
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    port_v4: u16,
    port_v6: u16,
    interval: Duration,
    own_device: DeviceId,
    listen_port: u16,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
) -> Result<BeaconHandles> {
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<(Bytes, SocketAddr)>(64);

    let reader_v4 =
        BeaconReader::new(bind_reuseaddr(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port_v4))?, inbound_tx.clone());
    let reader_v6 = BeaconReader::new(bind_reuseaddr(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), port_v6))?, inbound_tx);

    let (out_v4_tx, out_v4_rx) = mpsc::channel::<Bytes>(4);
    let (out_v6_tx, out_v6_rx) = mpsc::channel::<Bytes>(4);
    let writer_v4 = BeaconWriter::new(Ipv4Broadcaster::bind(port_v4)?, out_v4_rx);
    let writer_v6 = BeaconWriter::new(Ipv6Multicaster::bind(port_v6)?, out_v6_rx);

    let supervisors = vec![
        supervise_reader(reader_v4),
        supervise_reader(reader_v6),
        supervise_writer(writer_v4, metrics.clone()),
        supervise_writer(writer_v6, metrics.clone()),
    ];

    tokio::spawn(async move {
        while let Some((payload, src)) = inbound_rx.recv().await {
            match Announcement::decode(&payload) {
                Ok(ann) => {
                    let peer = DeviceId::from_bytes(ann.this_device.id);
                    if peer != own_device {
                        info!(%src, %peer, "discovered peer via LAN beacon");
                    }
                }
                Err(err) => tracing::debug!(%src, error = %err, "malformed beacon datagram"),
            }
        }
    });

    tokio::spawn(async move {
        let announcement = Announcement {
            this_device: Device { id: *own_device.as_bytes(), addresses: vec![Address::use_source_ip(listen_port)] },
            extra: Vec::new(),
        };
        let payload = Bytes::from(announcement.encode());

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    metrics.beacon_sends_total.add(1, &[]);
                    let _ = out_v4_tx.send(payload.clone()).await;
                    let _ = out_v6_tx.send(payload.clone()).await;
                }
                _ = shutdown.cancelled() => return,
            }
        }
    });

    Ok(BeaconHandles { supervisors })
}
