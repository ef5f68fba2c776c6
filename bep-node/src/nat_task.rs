//! Wires the NAT mapping service (§4.5) to this node's listen address.
//! Only UPnP is registered by default: UPnP discovers its gateway via SSDP
//! multicast, while NAT-PMP requires the default gateway address up front
//! (see `NatPmpProvider::new`), which this node has no portable way to
//! learn; deployments that know their gateway can still construct one and
//! add it to the provider list before calling `spawn`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bep_core::nat::{Mapping, NatMappingService, Protocol, UpnpProvider};
use bep_core::telemetry::Metrics;
use bep_core::{DeviceId, Supervisor};

pub struct NatHandle {
    pub service: Arc<NatMappingService>,
    pub supervisor: Arc<Supervisor>,
}

pub fn spawn(
    listen: SocketAddr,
    renewal_interval: Duration,
    device_id: DeviceId,
    metrics: Arc<Metrics>,
) -> NatHandle {
    let providers: Vec<Arc<dyn bep_core::nat::NatProvider>> =
        vec![Arc::new(UpnpProvider::new(false)), Arc::new(UpnpProvider::new(true))];

    let device_id_short = u64::from_be_bytes(device_id.as_bytes()[..8].try_into().expect("8 bytes"));
    let service = Arc::new(NatMappingService::new(providers, renewal_interval, device_id_short));

    service.add_mapping(Arc::new(Mapping::new(Protocol::Tcp, listen.ip(), listen.port())));
    metrics.nat_mappings_active.add(1, &[]);

    let supervisor = Arc::new(Supervisor::new());
    let spawned_service = service.clone();
    let spawned_supervisor = supervisor.clone();
    tokio::spawn(async move {
        spawned_supervisor
            .run(|cancel| {
                let service = &spawned_service;
                let metrics = metrics.clone();
                async move {
                    let result = service.run(cancel).await;
                    if result.is_err() {
                        metrics.nat_renewal_failures_total.add(1, &[]);
                    }
                    result
                }
            })
            .await;
    });

    NatHandle { service, supervisor }
}
