pub mod block;
pub mod cluster_config;
pub mod file;
pub mod index;
pub mod resolver;

pub use block::{BlockInfo, BLOCK_SIZE};
pub use cluster_config::{
    device_flags, ClusterConfig, ClusterConfigDevice, ClusterConfigFolder, ClusterConfigOption,
};
pub use file::{flags as file_flags, FileInfo};
pub use index::IndexMessage;
pub use resolver::{resolve, Resolution};
