mod beacon;
mod device;
mod folder;
mod loader;
mod nat;
mod root;
mod telemetry;
mod timeout;
mod tls;

pub use beacon::BeaconConfig;
pub use device::{DeviceConfig, KnownDevice};
pub use folder::FolderConfig;
pub use loader::load_from_path;
pub use nat::NatConfig;
pub use root::Config;
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::TimeoutConfig;
pub use tls::TlsConfig;
