use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::nat::mapping::Mapping;
use crate::nat::provider::{MappingRequest, NatProvider};

const PORT_FALLBACK_ATTEMPTS: u32 = 10;
const PORT_RANGE_START: u16 = 1024;
const PORT_RANGE_END: u16 = 65535;

/// FNV-1a, used only to fold a gateway id into the pseudo-random port
/// derivation seed; no cryptographic property is required here.
fn fnv64a(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    s.bytes().fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME))
}

/// `seed = device_id_short ^ internal_port ^ fnv64a(gateway_id)`, per §4.5.
pub fn derive_port_seed(device_id_short: u64, internal_port: u16, gateway_id: &str) -> u64 {
    device_id_short ^ internal_port as u64 ^ fnv64a(gateway_id)
}

/// The `attempt`-th predictable pseudo-random external port candidate for a
/// given seed, deterministic so every peer trying to reconnect a dropped
/// mapping converges on the same sequence.
pub fn candidate_port(seed: u64, attempt: u32) -> u16 {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(attempt as u64));
    rng.random_range(PORT_RANGE_START..=PORT_RANGE_END)
}

/// The per-process NAT mapping control loop (§4.5).
pub struct NatMappingService {
    mappings: RwLock<Vec<Arc<Mapping>>>,
    providers: Vec<Arc<dyn NatProvider>>,
    renewal_interval: Duration,
    device_id_short: u64,
    enabled: std::sync::atomic::AtomicBool,
}

impl NatMappingService {
    pub fn new(
        providers: Vec<Arc<dyn NatProvider>>,
        renewal_interval: Duration,
        device_id_short: u64,
    ) -> Self {
        Self {
            mappings: RwLock::new(Vec::new()),
            providers,
            renewal_interval,
            device_id_short,
            enabled: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn add_mapping(&self, mapping: Arc<Mapping>) {
        self.mappings.write().unwrap().push(mapping);
    }

    /// Detaches `mapping` and clears its address set synchronously (§8).
    pub fn remove_mapping(&self, mapping: &Arc<Mapping>) {
        self.mappings.write().unwrap().retain(|m| !Arc::ptr_eq(m, mapping));
        mapping.clear();
    }

    fn partition_by_expiry(&self) -> (Vec<Arc<Mapping>>, Vec<Arc<Mapping>>) {
        let now = Instant::now();
        let mappings = self.mappings.read().unwrap().clone();
        mappings.into_iter().partition(|m| m.is_expired(now))
    }

    async fn discover_all(&self, deadline: Duration) -> Vec<(Arc<dyn NatProvider>, crate::nat::provider::Gateway)> {
        let mut discovered = Vec::new();
        let futures = self.providers.iter().cloned().map(|provider| {
            let deadline = deadline;
            async move {
                match provider.discover(deadline).await {
                    Ok(gateways) => gateways.into_iter().map(|g| (provider.clone(), g)).collect(),
                    Err(err) => {
                        warn!(provider = provider.name(), error = %err, "gateway discovery failed");
                        Vec::new()
                    }
                }
            }
        });
        for result in futures_util::future::join_all(futures).await {
            discovered.extend(result);
        }
        discovered
    }

    async fn update_mapping(
        &self,
        mapping: &Arc<Mapping>,
        gateways: &[(Arc<dyn NatProvider>, crate::nat::provider::Gateway)],
        renew: bool,
    ) {
        for (provider, gateway) in gateways {
            if gateway.local_ip != mapping.local_ip {
                continue;
            }

            let existing_port = mapping.external_addresses().first().map(|a| a.port());
            let mut tried: Vec<u16> = Vec::new();
            if let Some(port) = existing_port.filter(|_| renew) {
                tried.push(port);
            }

            let seed = derive_port_seed(self.device_id_short, mapping.local_port, &gateway.id);
            for attempt in 0..PORT_FALLBACK_ATTEMPTS {
                let port = tried.first().copied().unwrap_or_else(|| candidate_port(seed, attempt));
                let request = MappingRequest {
                    protocol: mapping.protocol,
                    internal_ip: mapping.local_ip,
                    internal_port: mapping.local_port,
                    external_port: port,
                    lease_seconds: self.renewal_interval.as_secs() as u32 * 2,
                };
                match provider.add_mapping(gateway, &request).await {
                    Ok(addr) => {
                        mapping.set_external(gateway.id.clone(), addr);
                        mapping.set_expiry(Instant::now() + self.renewal_interval);
                        debug!(gateway = %gateway.id, addr = %addr, "mapping updated");
                        break;
                    }
                    Err(err) => {
                        tried.clear(); // fall through to the fallback sequence
                        debug!(gateway = %gateway.id, error = %err, attempt, "mapping attempt failed");
                    }
                }
            }
        }
    }

    /// Runs the control loop described in §4.5's pseudocode until
    /// cancelled. Suitable as the `start` function passed to a
    /// [`crate::supervisor::Supervisor`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            if !self.enabled.load(std::sync::atomic::Ordering::SeqCst) {
                tokio::select! {
                    _ = tokio::time::sleep(self.renewal_interval) => continue,
                    _ = cancel.cancelled() => return Ok(()),
                }
            }

            let (to_renew, to_update) = self.partition_by_expiry();
            if to_renew.is_empty() && to_update.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(self.renewal_interval) => continue,
                    _ = cancel.cancelled() => return Ok(()),
                }
            }

            let gateways = self.discover_all(self.renewal_interval).await;

            for mapping in &to_renew {
                self.update_mapping(mapping, &gateways, true).await;
            }
            for mapping in &to_update {
                self.update_mapping(mapping, &gateways, false).await;
            }

            let mappings = self.mappings.read().unwrap().clone();
            let next_due = mappings
                .iter()
                .filter_map(|m| m.expiry())
                .min()
                .unwrap_or_else(|| Instant::now() + self.renewal_interval);
            let sleep_for = next_due.saturating_duration_since(Instant::now());

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_seed_is_deterministic_given_the_same_inputs() {
        let a = derive_port_seed(42, 22000, "gw-1");
        let b = derive_port_seed(42, 22000, "gw-1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_gateways_produce_different_seeds() {
        let a = derive_port_seed(42, 22000, "gw-1");
        let b = derive_port_seed(42, 22000, "gw-2");
        assert_ne!(a, b);
    }

    #[test]
    fn candidate_ports_are_reproducible_and_in_range() {
        let seed = derive_port_seed(7, 22000, "gw-1");
        let first = candidate_port(seed, 0);
        let first_again = candidate_port(seed, 0);
        assert_eq!(first, first_again);
        assert!((PORT_RANGE_START..=PORT_RANGE_END).contains(&first));

        let second = candidate_port(seed, 1);
        assert_ne!(first, second, "distinct attempts should (almost always) diverge");
    }

    #[test]
    fn ten_fallback_attempts_stay_within_the_ephemeral_range() {
        let seed = derive_port_seed(1, 1, "gw");
        for attempt in 0..PORT_FALLBACK_ATTEMPTS {
            let port = candidate_port(seed, attempt);
            assert!((PORT_RANGE_START..=PORT_RANGE_END).contains(&port));
        }
    }
}
