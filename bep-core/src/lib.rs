#![forbid(unsafe_code)]

pub mod beacon;
pub mod codec;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod folder;
pub mod model;
pub mod nat;
pub mod semaphore;
pub mod store;
pub mod supervisor;
pub mod telemetry;
pub mod tls;

pub use config::{load_from_path, Config};
pub use connection::{spawn, BepConnection, ConnectionManager, PingConfig};
pub use device::DeviceId;
pub use error::{BepError, Result};
pub use folder::{FolderModel, FolderRegistry};
pub use store::{BlockStore, MemoryBlockStore};
pub use supervisor::Supervisor;
