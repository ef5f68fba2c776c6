use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::{BepError, Result};
use crate::nat::mapping::Protocol;
use crate::nat::provider::{Gateway, GatewayControl, MappingRequest, NatProvider};

pub const NATPMP_PORT: u16 = 5351;
const OPCODE_MAP_UDP: u8 = 1;
const OPCODE_MAP_TCP: u8 = 2;

/// NAT-PMP discovery and mapping, probed directly against the interface's
/// default gateway (there is no multicast discovery step in NAT-PMP).
pub struct NatPmpProvider {
    pub default_gateway: Ipv4Addr,
}

impl NatPmpProvider {
    pub fn new(default_gateway: Ipv4Addr) -> Self {
        Self { default_gateway }
    }
}

fn build_request(request: &MappingRequest) -> [u8; 12] {
    let opcode = match request.protocol {
        Protocol::Udp => OPCODE_MAP_UDP,
        Protocol::Tcp => OPCODE_MAP_TCP,
    };
    let mut buf = [0u8; 12];
    buf[0] = 0; // version
    buf[1] = opcode;
    // buf[2..4] reserved, zero
    buf[4..6].copy_from_slice(&request.internal_port.to_be_bytes());
    buf[6..8].copy_from_slice(&request.external_port.to_be_bytes());
    buf[8..12].copy_from_slice(&request.lease_seconds.to_be_bytes());
    buf
}

/// Parses a NAT-PMP mapping response: `{version, opcode, resultCode,
/// secondsSinceEpoch, internalPort, externalPort, lifetime}`.
fn parse_response(bytes: &[u8]) -> Result<(u16, u16, u32)> {
    if bytes.len() < 16 {
        return Err(BepError::Protocol("NAT-PMP response too short".into()));
    }
    let result_code = u16::from_be_bytes([bytes[2], bytes[3]]);
    if result_code != 0 {
        return Err(BepError::Temporary(format!("NAT-PMP result code {result_code}")));
    }
    let internal_port = u16::from_be_bytes([bytes[8], bytes[9]]);
    let external_port = u16::from_be_bytes([bytes[10], bytes[11]]);
    let lifetime = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    Ok((internal_port, external_port, lifetime))
}

#[async_trait]
impl NatProvider for NatPmpProvider {
    fn name(&self) -> &'static str {
        "nat-pmp"
    }

    async fn discover(&self, deadline: Duration) -> Result<Vec<Gateway>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(BepError::Io)?;
        let gateway_addr = SocketAddrV4::new(self.default_gateway, NATPMP_PORT);

        // The simplest possible liveness probe: an external-address request
        // (opcode 0) with no body.
        socket.send_to(&[0, 0], gateway_addr).await.map_err(BepError::Io)?;

        let mut buf = [0u8; 16];
        match timeout(deadline, socket.recv_from(&mut buf)).await {
            Ok(Ok(_)) => Ok(vec![Gateway {
                id: format!("natpmp-{}", self.default_gateway),
                local_ip: IpAddr::V4(self.default_gateway),
                control: GatewayControl::NatPmp { gateway_addr: SocketAddr::V4(gateway_addr) },
            }]),
            Ok(Err(e)) => Err(BepError::Io(e)),
            Err(_) => Err(BepError::Temporary("NAT-PMP gateway did not respond".into())),
        }
    }

    async fn add_mapping(&self, gateway: &Gateway, request: &MappingRequest) -> Result<SocketAddr> {
        let gateway_addr = match gateway.control {
            GatewayControl::NatPmp { gateway_addr } => gateway_addr,
            _ => return Err(BepError::Protocol("not a NAT-PMP gateway".into())),
        };

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(BepError::Io)?;
        socket.send_to(&build_request(request), gateway_addr).await.map_err(BepError::Io)?;

        let mut buf = [0u8; 16];
        let (n, _src) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .map_err(|_| BepError::Temporary("NAT-PMP mapping request timed out".into()))?
            .map_err(BepError::Io)?;

        let (_internal_port, external_port, _lifetime) = parse_response(&buf[..n])?;
        Ok(SocketAddr::new(IpAddr::V4(self.default_gateway), external_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_well_formed_udp_map_request() {
        let req = MappingRequest {
            protocol: Protocol::Udp,
            internal_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 5)),
            internal_port: 22000,
            external_port: 22000,
            lease_seconds: 7200,
        };
        let bytes = build_request(&req);
        assert_eq!(bytes[1], OPCODE_MAP_UDP);
        assert_eq!(u16::from_be_bytes([bytes[4], bytes[5]]), 22000);
        assert_eq!(u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 7200);
    }

    #[test]
    fn tcp_request_uses_the_tcp_opcode() {
        let req = MappingRequest {
            protocol: Protocol::Tcp,
            internal_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            internal_port: 1,
            external_port: 1,
            lease_seconds: 0,
        };
        assert_eq!(build_request(&req)[1], OPCODE_MAP_TCP);
    }

    #[test]
    fn parse_response_rejects_nonzero_result_code() {
        let mut buf = [0u8; 16];
        buf[3] = 1; // result code 1
        assert!(parse_response(&buf).is_err());
    }

    #[test]
    fn parse_response_reads_ports_and_lifetime() {
        let mut buf = [0u8; 16];
        buf[8..10].copy_from_slice(&22000u16.to_be_bytes());
        buf[10..12].copy_from_slice(&31000u16.to_be_bytes());
        buf[12..16].copy_from_slice(&3600u32.to_be_bytes());
        let (internal, external, lifetime) = parse_response(&buf).unwrap();
        assert_eq!(internal, 22000);
        assert_eq!(external, 31000);
        assert_eq!(lifetime, 3600);
    }

    #[test]
    fn short_response_is_rejected() {
        assert!(parse_response(&[0u8; 4]).is_err());
    }
}
