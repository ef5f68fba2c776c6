use crate::device::DeviceId;

/// Per-device flags within a folder's device list.
pub mod device_flags {
    /// Trusted: the device's changes are accepted without restriction.
    pub const TRUSTED: u32 = 1 << 0;
    /// Read-only: the device only receives, never sends, changes.
    pub const READ_ONLY: u32 = 1 << 1;
    /// Introducer: peers advertised by this device are auto-trusted.
    pub const INTRODUCER: u32 = 1 << 2;

    pub const PRIORITY_MASK: u32 = 0b11 << 14;
    pub const PRIORITY_NORMAL: u32 = 0b00 << 14;
    pub const PRIORITY_HIGH: u32 = 0b01 << 14;
    pub const PRIORITY_LOW: u32 = 0b10 << 14;
    pub const PRIORITY_DISABLED: u32 = 0b11 << 14;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfigDevice {
    pub id: DeviceId,
    pub flags: u32,
    pub max_local_version: u64,
}

impl ClusterConfigDevice {
    /// Exactly one of Trusted/ReadOnly must be set; this validates that.
    pub fn has_exactly_one_trust_flag(&self) -> bool {
        let trusted = self.flags & device_flags::TRUSTED != 0;
        let read_only = self.flags & device_flags::READ_ONLY != 0;
        trusted != read_only
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfigFolder {
    pub id: String,
    pub devices: Vec<ClusterConfigDevice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfigOption {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub client_name: String,
    pub client_version: String,
    pub folders: Vec<ClusterConfigFolder>,
    pub options: Vec<ClusterConfigOption>,
}

impl ClusterConfig {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.iter().find(|o| o.key == key).map(|o| o.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_trust_flag_required() {
        let dev = ClusterConfigDevice {
            id: DeviceId::LOCAL,
            flags: device_flags::TRUSTED | device_flags::READ_ONLY,
            max_local_version: 0,
        };
        assert!(!dev.has_exactly_one_trust_flag());

        let dev = ClusterConfigDevice { flags: device_flags::TRUSTED, ..dev };
        assert!(dev.has_exactly_one_trust_flag());
    }
}
