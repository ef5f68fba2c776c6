#![forbid(unsafe_code)]

mod beacon_task;
mod dialer;
mod listener;
mod nat_task;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bep_core::config::KnownDevice;
use bep_core::folder::FolderRegistry;
use bep_core::store::{BlockStore, MemoryBlockStore};
use bep_core::telemetry::Metrics;
use bep_core::tls::{build_acceptor, build_connector, StaticTlsMaterial, TlsMaterial};
use bep_core::{load_from_path, ConnectionManager, DeviceId, PingConfig, Supervisor};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "BEP core reference node")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "config/bep-node.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            // Tracing isn't initialized yet; a bad config path is common
            // enough on first run that stderr is the right channel.
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = bep_core::telemetry::init_tracing_with_otel(
        cfg.logging.level.clone(),
        cfg.logging.show_target,
        cfg.telemetry.otel_log_level.clone(),
    ) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    if let Err(err) = run(cfg).await {
        error!(%err, "bep-node exited with error");
        std::process::exit(1);
    }

    bep_core::telemetry::shutdown_tracing();
}

async fn run(cfg: bep_core::Config) -> bep_core::Result<()> {
    let _ = tokio_rustls::rustls::crypto::ring::default_provider().install_default();

    let material = StaticTlsMaterial::load(&cfg.tls.cert_path, &cfg.tls.key_path)?;
    let own_device = DeviceId::from_certificate_der(material.leaf_certificate_der().as_ref());
    info!(device = %own_device, listen = %cfg.device.listen, "starting bep-node");

    let acceptor = build_acceptor(&material)?;
    let connector = build_connector(&material)?;

    let folders = Arc::new(FolderRegistry::new());
    for folder in &cfg.folders {
        folders.get_or_create(&folder.id);
    }
    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
    let manager = Arc::new(ConnectionManager::new());

    let ping_config = PingConfig {
        idle: Duration::from_secs(cfg.timeout.ping_idle_secs),
        timeout: Duration::from_secs(cfg.timeout.ping_timeout_secs),
    };
    let handshake_timeout = Duration::from_secs(cfg.timeout.tls_handshake_secs);

    let shutdown = CancellationToken::new();

    let (metrics, registry) = bep_core::telemetry::init_metrics()
        .map_err(|e| bep_core::BepError::Config(format!("failed to init metrics: {e}")))?;
    if let Some(port) = cfg.telemetry.metrics_port {
        let registry = registry.clone();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = bep_core::telemetry::start_metrics_server(port, registry, cancel).await {
                warn!(error = %err, "metrics server exited with error");
            }
        });
    }

    let listener_handle = {
        let acceptor = acceptor.clone();
        let folders = folders.clone();
        let store = store.clone();
        let manager = manager.clone();
        let metrics = metrics.clone();
        let cancel = shutdown.clone();
        let listen = cfg.device.listen;
        tokio::spawn(async move {
            if let Err(err) = listener::run(
                listen, acceptor, folders, store, ping_config, handshake_timeout, manager, metrics, cancel,
            )
            .await
            {
                error!(error = %err, "listener exited with error");
            }
        })
    };

    let dial_supervisors: Vec<Arc<Supervisor>> = cfg
        .device
        .known_devices
        .iter()
        .cloned()
        .map(|known: KnownDevice| {
            spawn_dialer(
                known,
                connector.clone(),
                folders.clone(),
                store.clone(),
                ping_config,
                handshake_timeout,
                manager.clone(),
                metrics.clone(),
            )
        })
        .collect();

    let nat_handle = cfg.nat.enabled.then(|| {
        nat_task::spawn(
            cfg.device.listen,
            Duration::from_secs(cfg.nat.renewal_interval_secs),
            own_device,
            metrics.clone(),
        )
    });

    let beacon_handles = if cfg.beacon.enabled {
        Some(beacon_task::spawn(
            cfg.beacon.port_v4,
            cfg.beacon.port_v6,
            Duration::from_secs(cfg.beacon.interval_secs),
            own_device,
            cfg.device.listen.port(),
            metrics.clone(),
            shutdown.clone(),
        )?)
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, draining");

    shutdown.cancel();
    listener_handle.abort();
    for supervisor in &dial_supervisors {
        supervisor.cancel();
    }
    if let Some(nat_handle) = &nat_handle {
        nat_handle.supervisor.cancel();
    }
    if let Some(beacon_handles) = &beacon_handles {
        beacon_handles.shutdown();
    }

    tokio::time::sleep(Duration::from_secs(cfg.timeout.shutdown_secs).min(Duration::from_secs(5))).await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spawn_dialer(
    known: KnownDevice,
    connector: tokio_rustls::TlsConnector,
    folders: Arc<FolderRegistry>,
    store: Arc<dyn BlockStore>,
    ping_config: PingConfig,
    handshake_timeout: Duration,
    manager: Arc<ConnectionManager>,
    metrics: Arc<Metrics>,
) -> Arc<Supervisor> {
    let supervisor = Arc::new(Supervisor::new());
    let spawned = supervisor.clone();
    tokio::spawn(async move {
        spawned
            .run(|cancel| {
                dialer::run(
                    known.clone(),
                    connector.clone(),
                    folders.clone(),
                    store.clone(),
                    ping_config,
                    handshake_timeout,
                    manager.clone(),
                    metrics.clone(),
                    cancel,
                )
            })
            .await;
    });
    supervisor
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
