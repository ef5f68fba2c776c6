use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::nat::mapping::Protocol;

/// A gateway discovered by some [`NatProvider`]: either a UPnP IGD control
/// point or a NAT-PMP-speaking default gateway.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub id: String,
    pub local_ip: IpAddr,
    pub control: GatewayControl,
}

#[derive(Debug, Clone)]
pub enum GatewayControl {
    Upnp { control_url: String, service_type: String },
    NatPmp { gateway_addr: SocketAddr },
    Pinhole { control_url: String, service_type: String },
}

/// A port-mapping or pinhole request to attempt against a discovered
/// gateway.
#[derive(Debug, Clone)]
pub struct MappingRequest {
    pub protocol: Protocol,
    pub internal_ip: IpAddr,
    pub internal_port: u16,
    pub external_port: u16,
    pub lease_seconds: u32,
}

/// One NAT-traversal mechanism: UPnP IGDv1, IGDv2, IPv6 firewall control, or
/// NAT-PMP. §4.5 runs discovery across all registered providers in
/// parallel.
#[async_trait]
pub trait NatProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Discovers reachable gateways within `deadline`.
    async fn discover(&self, deadline: Duration) -> Result<Vec<Gateway>>;

    /// Attempts to create or renew a mapping on `gateway`, returning the
    /// external address the gateway assigned.
    async fn add_mapping(&self, gateway: &Gateway, request: &MappingRequest) -> Result<SocketAddr>;
}
