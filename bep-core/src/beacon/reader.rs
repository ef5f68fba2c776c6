use std::net::SocketAddr;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BepError, Result};

const RECV_BUF_LEN: usize = 2048;

/// Binds a UDP socket for beacon reception, with `SO_REUSEADDR` set so a
/// restarted reader does not race a still-closing predecessor for the port.
pub fn bind_reuseaddr(addr: SocketAddr) -> Result<UdpSocket> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(BepError::Io)?;
    socket.set_reuse_address(true).map_err(BepError::Io)?;
    if addr.is_ipv4() {
        socket.set_broadcast(true).map_err(BepError::Io)?;
    }
    socket.set_nonblocking(true).map_err(BepError::Io)?;
    socket.bind(&addr.into()).map_err(BepError::Io)?;
    UdpSocket::from_std(socket.into()).map_err(BepError::Io)
}

/// Receives beacon datagrams and forwards `(payload, source)` pairs into a
/// bounded channel for a consumer (local discovery's peer table) to drain.
pub struct BeaconReader {
    socket: UdpSocket,
    out: mpsc::Sender<(Bytes, SocketAddr)>,
}

impl BeaconReader {
    pub fn new(socket: UdpSocket, out: mpsc::Sender<(Bytes, SocketAddr)>) -> Self {
        Self { socket, out }
    }

    /// The supervised read loop: forwards datagrams until `cancel` fires or
    /// the receive fails, in which case the error is returned so the
    /// supervisor can back off and restart.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut buf = [0u8; RECV_BUF_LEN];
        loop {
            tokio::select! {
                recv = self.socket.recv_from(&mut buf) => {
                    let (n, src) = recv.map_err(BepError::Io)?;
                    debug!(bytes = n, %src, "beacon datagram received");
                    if self.out.send((Bytes::copy_from_slice(&buf[..n]), src)).await.is_err() {
                        return Ok(());
                    }
                }
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_a_received_datagram_with_its_source() {
        let reader_addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_reuseaddr(reader_addr).unwrap();
        let local = socket.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"hello", local).await.unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        let reader = BeaconReader::new(socket, tx);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(async move { reader.run(cancel_clone).await });
        let (bytes, _src) = rx.recv().await.unwrap();
        assert_eq!(&bytes[..], b"hello");
        cancel.cancel();
        let _ = handle.await;
    }
}
