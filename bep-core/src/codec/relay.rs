use crate::codec::xdr::{put_opaque, put_u32, Reader};
use crate::error::{BepError, Result};

pub const RELAY_MAGIC: u32 = 0x9E79BC40;
pub const RELAY_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RelayMessageType {
    Ping = 0,
    Pong = 1,
    JoinRequest = 2,
    JoinSessionRequest = 3,
    Response = 4,
    ConnectRequest = 5,
    SessionInvitation = 6,
}

impl RelayMessageType {
    pub fn from_i32(v: i32) -> Result<Self> {
        Ok(match v {
            0 => Self::Ping,
            1 => Self::Pong,
            2 => Self::JoinRequest,
            3 => Self::JoinSessionRequest,
            4 => Self::Response,
            5 => Self::ConnectRequest,
            6 => Self::SessionInvitation,
            other => return Err(BepError::Protocol(format!("unknown relay message type {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub id: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInvitation {
    pub key: [u8; 32],
    pub address: Vec<u8>,
    pub port: u16,
    pub server_socket: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Ping,
    Pong,
    JoinRequest,
    ConnectRequest(ConnectRequest),
    SessionInvitation(SessionInvitation),
}

impl RelayMessage {
    pub fn message_type(&self) -> RelayMessageType {
        match self {
            RelayMessage::Ping => RelayMessageType::Ping,
            RelayMessage::Pong => RelayMessageType::Pong,
            RelayMessage::JoinRequest => RelayMessageType::JoinRequest,
            RelayMessage::ConnectRequest(_) => RelayMessageType::ConnectRequest,
            RelayMessage::SessionInvitation(_) => RelayMessageType::SessionInvitation,
        }
    }

    fn encode_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            RelayMessage::ConnectRequest(r) => put_opaque(&mut buf, &r.id),
            RelayMessage::SessionInvitation(inv) => {
                put_opaque(&mut buf, &inv.key);
                put_opaque(&mut buf, &inv.address);
                put_u32(&mut buf, inv.port as u32);
                put_u32(&mut buf, inv.server_socket as u32);
            }
            RelayMessage::Ping | RelayMessage::Pong | RelayMessage::JoinRequest => {}
        }
        buf
    }

    /// Encodes the full relay frame: 12-byte header (magic, type, length)
    /// followed by the XDR body.
    pub fn encode(&self) -> Vec<u8> {
        let body = self.encode_body();
        let mut out = Vec::with_capacity(RELAY_HEADER_LEN + body.len());
        put_u32(&mut out, RELAY_MAGIC);
        out.extend_from_slice(&(self.message_type() as i32).to_be_bytes());
        out.extend_from_slice(&(body.len() as i32).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RELAY_HEADER_LEN {
            return Err(BepError::Protocol("relay frame shorter than its header".into()));
        }
        let mut reader = Reader::new(bytes);
        let magic = reader.get_u32()?;
        if magic != RELAY_MAGIC {
            return Err(BepError::Protocol(format!("bad relay magic 0x{magic:08x}")));
        }
        let type_ = reader.get_u32()? as i32;
        let length = reader.get_u32()? as i32;
        if length < 0 {
            return Err(BepError::Protocol("negative relay frame length".into()));
        }
        let body = &bytes[RELAY_HEADER_LEN..];
        if body.len() != length as usize {
            return Err(BepError::Protocol(format!(
                "relay frame declared {length} body bytes, found {}",
                body.len()
            )));
        }
        let mut body_reader = Reader::new(body);
        Ok(match RelayMessageType::from_i32(type_)? {
            RelayMessageType::Ping => RelayMessage::Ping,
            RelayMessageType::Pong => RelayMessage::Pong,
            RelayMessageType::JoinRequest | RelayMessageType::JoinSessionRequest => {
                RelayMessage::JoinRequest
            }
            RelayMessageType::Response => {
                return Err(BepError::Protocol("bare relay Response has no defined body".into()))
            }
            RelayMessageType::ConnectRequest => {
                let id_bytes = body_reader.get_opaque()?;
                if id_bytes.len() != 32 {
                    return Err(BepError::Protocol("ConnectRequest id must be 32 bytes".into()));
                }
                let mut id = [0u8; 32];
                id.copy_from_slice(&id_bytes);
                RelayMessage::ConnectRequest(ConnectRequest { id })
            }
            RelayMessageType::SessionInvitation => {
                let key_bytes = body_reader.get_opaque()?;
                if key_bytes.len() != 32 {
                    return Err(BepError::Protocol("SessionInvitation key must be 32 bytes".into()));
                }
                let mut key = [0u8; 32];
                key.copy_from_slice(&key_bytes);
                let address = body_reader.get_opaque()?;
                let port = body_reader.get_u32()? as u16;
                let server_socket = body_reader.get_u32()? != 0;
                RelayMessage::SessionInvitation(SessionInvitation {
                    key,
                    address,
                    port,
                    server_socket,
                })
            }
        })
    }
}
