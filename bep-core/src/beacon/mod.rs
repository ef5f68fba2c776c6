//! LAN beacon (§4.6): broadcast (IPv4) and multicast (IPv6) advertise/receive
//! loops built from two independent casters sharing a reader/writer
//! framework, each restartable under [`crate::supervisor::Supervisor`].

mod broadcast;
mod reader;
mod writer;

pub use broadcast::directed_broadcast;
pub use reader::{bind_reuseaddr, BeaconReader};
pub use writer::{BeaconWriter, Caster, Ipv4Broadcaster, Ipv6Multicaster};

/// Default IPv4 beacon port (§4.6, "UDP port N (e.g. 21025)").
pub const DEFAULT_BEACON_PORT_V4: u16 = 21025;
/// IPv6 multicast beacon port is `N+1`.
pub const DEFAULT_BEACON_PORT_V6: u16 = 21026;
