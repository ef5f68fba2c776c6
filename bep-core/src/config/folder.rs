use serde::Deserialize;

/// One shared folder: the id exchanged in `ClusterConfig`/`Index` messages
/// and the set of device ids it is shared with. Filesystem scanning and
/// placement are out of scope; this only drives which `FolderModel` gets
/// created and who it accepts indexes from.
#[derive(Debug, Deserialize, Clone)]
pub struct FolderConfig {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Device ids (dashed display form) this folder is shared with.
    #[serde(default)]
    pub shared_with: Vec<String>,
    /// Advertised as `ClusterConfigDevice`'s read-only flag.
    #[serde(default)]
    pub read_only: bool,
}
