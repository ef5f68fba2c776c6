use serde::Deserialize;

use super::beacon::BeaconConfig;
use super::device::DeviceConfig;
use super::folder::FolderConfig;
use super::nat::NatConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;
use super::tls::TlsConfig;

/// Top-level configuration for a `bep-node` instance.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub device: DeviceConfig,
    pub tls: TlsConfig,
    #[serde(default)]
    pub folders: Vec<FolderConfig>,
    #[serde(default)]
    pub nat: NatConfig,
    #[serde(default)]
    pub beacon: BeaconConfig,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
