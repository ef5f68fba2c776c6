//! NAT traversal (§4.5): UPnP IGD and NAT-PMP port mapping, driven by a
//! single control loop that keeps a set of [`mapping::Mapping`]s renewed
//! across whatever gateways [`provider::NatProvider`]s discover.

mod mapping;
mod natpmp;
mod provider;
mod service;
mod upnp;

pub use mapping::{Mapping, Protocol};
pub use natpmp::NatPmpProvider;
pub use provider::{Gateway, GatewayControl, MappingRequest, NatProvider};
pub use service::{candidate_port, derive_port_seed, NatMappingService};
pub use upnp::UpnpProvider;
