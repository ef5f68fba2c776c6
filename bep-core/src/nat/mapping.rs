use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// One `(protocol, internal ip, internal port) -> {external address per
/// gateway}` mapping (§4.5, glossary). Observers subscribe to the full
/// current address set; per Open Question (a) a change is always published
/// as a single atomic snapshot rather than separate add/remove deltas.
pub struct Mapping {
    pub protocol: Protocol,
    pub local_ip: IpAddr,
    pub local_port: u16,
    external: Mutex<HashMap<String, SocketAddr>>,
    expires_at: Mutex<Option<Instant>>,
    changes: watch::Sender<Vec<SocketAddr>>,
}

impl Mapping {
    pub fn new(protocol: Protocol, local_ip: IpAddr, local_port: u16) -> Self {
        let (changes, _rx) = watch::channel(Vec::new());
        Self {
            protocol,
            local_ip,
            local_port,
            external: Mutex::new(HashMap::new()),
            expires_at: Mutex::new(None),
            changes,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<SocketAddr>> {
        self.changes.subscribe()
    }

    pub fn external_addresses(&self) -> Vec<SocketAddr> {
        self.external.lock().unwrap().values().copied().collect()
    }

    /// Records (or updates) the external address this mapping holds on
    /// `gateway_id` and publishes the resulting full snapshot.
    pub fn set_external(&self, gateway_id: impl Into<String>, addr: SocketAddr) {
        let snapshot = {
            let mut external = self.external.lock().unwrap();
            external.insert(gateway_id.into(), addr);
            external.values().copied().collect::<Vec<_>>()
        };
        let _ = self.changes.send(snapshot);
    }

    pub fn forget_gateway(&self, gateway_id: &str) {
        let snapshot = {
            let mut external = self.external.lock().unwrap();
            external.remove(gateway_id);
            external.values().copied().collect::<Vec<_>>()
        };
        let _ = self.changes.send(snapshot);
    }

    /// Detaches the mapping's address set synchronously (§8 "NAT mapping
    /// clearing"): never blocks on any in-flight discovery.
    pub fn clear(&self) {
        self.external.lock().unwrap().clear();
        let _ = self.changes.send(Vec::new());
    }

    pub fn set_expiry(&self, at: Instant) {
        *self.expires_at.lock().unwrap() = Some(at);
    }

    pub fn expiry(&self) -> Option<Instant> {
        *self.expires_at.lock().unwrap()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expiry() {
            Some(at) => now >= at,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn mapping() -> Mapping {
        Mapping::new(Protocol::Tcp, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)), 22000)
    }

    #[test]
    fn set_external_publishes_a_full_snapshot() {
        let m = mapping();
        let mut rx = m.subscribe();
        let addr: SocketAddr = "203.0.113.1:22000".parse().unwrap();
        m.set_external("gw1", addr);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![addr]);
        assert_eq!(m.external_addresses(), vec![addr]);
    }

    #[test]
    fn clear_detaches_synchronously_without_touching_expiry_logic() {
        let m = mapping();
        m.set_external("gw1", "203.0.113.1:22000".parse().unwrap());
        assert_eq!(m.external_addresses().len(), 1);
        m.clear();
        assert!(m.external_addresses().is_empty());
    }

    #[test]
    fn no_expiry_set_counts_as_expired() {
        let m = mapping();
        assert!(m.is_expired(Instant::now()));
        m.set_expiry(Instant::now() + Duration::from_secs(3600));
        assert!(!m.is_expired(Instant::now()));
    }

    #[test]
    fn forget_gateway_removes_only_that_gateways_address() {
        let m = mapping();
        m.set_external("gw1", "203.0.113.1:1".parse().unwrap());
        m.set_external("gw2", "203.0.113.2:1".parse().unwrap());
        m.forget_gateway("gw1");
        let remaining = m.external_addresses();
        assert_eq!(remaining, vec!["203.0.113.2:1".parse().unwrap()]);
    }
}
