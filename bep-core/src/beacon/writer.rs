use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::beacon::broadcast::directed_broadcast;
use crate::error::{BepError, Result};

/// Network operations carry explicit deadlines; beacon writes get 1s per
/// destination (§4.6 Design Notes / §4.5's deadline rule).
const WRITE_DEADLINE: Duration = Duration::from_secs(1);
const IPV6_MULTICAST_GROUP: &str = "ff32::5222";

/// Sends an outbound payload to every global-unicast IPv4 interface's
/// directed broadcast address, falling back to the limited broadcast
/// address if interface enumeration fails or yields nothing.
pub struct Ipv4Broadcaster {
    socket: UdpSocket,
    port: u16,
}

impl Ipv4Broadcaster {
    pub fn bind(port: u16) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP)).map_err(BepError::Io)?;
        socket.set_reuse_address(true).map_err(BepError::Io)?;
        socket.set_broadcast(true).map_err(BepError::Io)?;
        socket.set_nonblocking(true).map_err(BepError::Io)?;
        socket
            .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port).into())
            .map_err(BepError::Io)?;
        Ok(Self { socket: UdpSocket::from_std(socket.into()).map_err(BepError::Io)?, port })
    }

    fn destinations(&self) -> Vec<Ipv4Addr> {
        match if_addrs::get_if_addrs() {
            Ok(interfaces) => {
                let dests: Vec<Ipv4Addr> = interfaces
                    .into_iter()
                    .filter_map(|iface| match iface.addr {
                        if_addrs::IfAddr::V4(v4) if !iface.is_loopback() && is_global_unicast_v4(v4.ip) => {
                            Some(directed_broadcast(v4.ip, prefix_len(v4.netmask)))
                        }
                        _ => None,
                    })
                    .collect();
                if dests.is_empty() {
                    vec![Ipv4Addr::BROADCAST]
                } else {
                    dests
                }
            }
            Err(err) => {
                warn!(error = %err, "interface enumeration failed, falling back to limited broadcast");
                vec![Ipv4Addr::BROADCAST]
            }
        }
    }

    /// Sends `payload` to every destination with a 1s deadline each; at
    /// least one successful destination clears the error (§4.6).
    pub async fn send(&self, payload: &Bytes) -> Result<()> {
        let mut any_ok = false;
        for dest in self.destinations() {
            let target = SocketAddr::V4(SocketAddrV4::new(dest, self.port));
            match timeout(WRITE_DEADLINE, self.socket.send_to(payload, target)).await {
                Ok(Ok(_)) => {
                    any_ok = true;
                    debug!(%target, "beacon sent");
                }
                Ok(Err(err)) => warn!(%target, error = %err, "beacon send failed"),
                Err(_) => warn!(%target, "beacon send timed out"),
            }
        }
        if any_ok {
            Ok(())
        } else {
            Err(BepError::Temporary("no beacon destination accepted the write".into()))
        }
    }
}

fn is_global_unicast_v4(ip: Ipv4Addr) -> bool {
    !(ip.is_loopback() || ip.is_link_local() || ip.is_unspecified() || ip.is_multicast())
}

fn prefix_len(netmask: Ipv4Addr) -> u8 {
    u32::from(netmask).count_ones() as u8
}

/// Joins the IPv6 multicast beacon group on every multicast-capable
/// interface and sends with a hop limit of 1 (link-local only).
pub struct Ipv6Multicaster {
    socket: UdpSocket,
    group: Ipv6Addr,
    port: u16,
}

impl Ipv6Multicaster {
    pub fn bind(port: u16) -> Result<Self> {
        let group: Ipv6Addr = IPV6_MULTICAST_GROUP.parse().expect("valid multicast literal");
        let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(SockProtocol::UDP)).map_err(BepError::Io)?;
        socket.set_reuse_address(true).map_err(BepError::Io)?;
        socket.set_only_v6(true).map_err(BepError::Io)?;
        socket.set_multicast_hops_v6(1).map_err(BepError::Io)?;
        socket.set_nonblocking(true).map_err(BepError::Io)?;
        socket
            .bind(&SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0).into())
            .map_err(BepError::Io)?;

        if let Ok(interfaces) = if_addrs::get_if_addrs() {
            for iface in interfaces {
                if let if_addrs::IfAddr::V6(v6) = iface.addr {
                    if v6.ip.is_multicast() || iface.is_loopback() {
                        continue;
                    }
                    let _ = socket.join_multicast_v6(&group, iface.index.unwrap_or(0));
                }
            }
        }

        Ok(Self { socket: UdpSocket::from_std(socket.into()).map_err(BepError::Io)?, group, port })
    }

    pub async fn send(&self, payload: &Bytes) -> Result<()> {
        let target = SocketAddr::V6(SocketAddrV6::new(self.group, self.port, 0, 0));
        match timeout(WRITE_DEADLINE, self.socket.send_to(payload, target)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(BepError::Io(err)),
            Err(_) => Err(BepError::Temporary("ipv6 beacon send timed out".into())),
        }
    }
}

/// One supervised caster: drains outbound payloads from `inbound` and sends
/// each on `sender`. A send failure propagates so the supervisor backs off
/// and restarts (§4.6).
pub struct BeaconWriter<S> {
    sender: S,
    inbound: tokio::sync::Mutex<mpsc::Receiver<Bytes>>,
}

#[async_trait::async_trait]
pub trait Caster: Send + Sync {
    async fn send(&self, payload: &Bytes) -> Result<()>;
}

#[async_trait::async_trait]
impl Caster for Ipv4Broadcaster {
    async fn send(&self, payload: &Bytes) -> Result<()> {
        Ipv4Broadcaster::send(self, payload).await
    }
}

#[async_trait::async_trait]
impl Caster for Ipv6Multicaster {
    async fn send(&self, payload: &Bytes) -> Result<()> {
        Ipv6Multicaster::send(self, payload).await
    }
}

impl<S: Caster> BeaconWriter<S> {
    pub fn new(sender: S, inbound: mpsc::Receiver<Bytes>) -> Self {
        Self { sender, inbound: tokio::sync::Mutex::new(inbound) }
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        loop {
            let payload = {
                let mut inbound = self.inbound.lock().await;
                tokio::select! {
                    item = inbound.recv() => item,
                    _ = cancel.cancelled() => return Ok(()),
                }
            };
            let Some(payload) = payload else { return Ok(()) };
            self.sender.send(&payload).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_unicast_filters_loopback_and_link_local() {
        assert!(!is_global_unicast_v4(Ipv4Addr::new(127, 0, 0, 1)));
        assert!(!is_global_unicast_v4(Ipv4Addr::new(169, 254, 1, 1)));
        assert!(is_global_unicast_v4(Ipv4Addr::new(10, 0, 1, 5)));
    }

    #[test]
    fn prefix_len_counts_mask_bits() {
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 0)), 24);
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 128)), 25);
    }
}
