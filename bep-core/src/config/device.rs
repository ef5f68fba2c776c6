use serde::Deserialize;

/// A peer this device is configured to trust, by advertised id and
/// optionally a fixed set of dial addresses (falling back to discovery).
#[derive(Debug, Deserialize, Clone)]
pub struct KnownDevice {
    /// The device's id in dashed display form (parsed via `DeviceId::parse`).
    pub id: String,
    /// Statically configured addresses to dial, e.g. "192.168.1.5:22000".
    /// Empty means rely entirely on local/global discovery.
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// This device's own identity and listening configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Address to listen for incoming BEP connections on.
    pub listen: std::net::SocketAddr,
    /// Devices this instance is configured to connect to or accept from.
    #[serde(default)]
    pub known_devices: Vec<KnownDevice>,
}
