use serde::Deserialize;

/// NAT traversal configuration (§4.5).
#[derive(Debug, Deserialize, Clone)]
pub struct NatConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How often mappings are renewed; also the discovery deadline for one
    /// control-loop pass.
    #[serde(default = "default_renewal_secs")]
    pub renewal_interval_secs: u64,
    /// Requested lease duration handed to providers; `0` requests a
    /// permanent mapping (subject to the UPnP error-725 fallback).
    #[serde(default = "default_lease_secs")]
    pub lease_seconds: u32,
}

impl Default for NatConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            renewal_interval_secs: default_renewal_secs(),
            lease_seconds: default_lease_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_renewal_secs() -> u64 {
    3600
}

fn default_lease_secs() -> u32 {
    7200
}
