use serde::Deserialize;

use crate::beacon::{DEFAULT_BEACON_PORT_V4, DEFAULT_BEACON_PORT_V6};

/// LAN beacon configuration (§4.6).
#[derive(Debug, Deserialize, Clone)]
pub struct BeaconConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_port_v4")]
    pub port_v4: u16,
    #[serde(default = "default_port_v6")]
    pub port_v6: u16,
    /// How often this device sends an announcement.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port_v4: default_port_v4(),
            port_v6: default_port_v6(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_port_v4() -> u16 {
    DEFAULT_BEACON_PORT_V4
}

fn default_port_v6() -> u16 {
    DEFAULT_BEACON_PORT_V6
}

fn default_interval_secs() -> u64 {
    60
}
