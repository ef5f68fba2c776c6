//! The folder model (§4.3): per-folder `FileInfo` map with Lamport version
//! resolution, and the registry that owns one [`FolderModel`] per folder id.

mod model;
mod registry;

pub use model::FolderModel;
pub use registry::FolderRegistry;
