use crate::codec::xdr::{put_opaque, put_u32, Reader};
use crate::error::{BepError, Result};

pub const ANNOUNCEMENT_MAGIC: u32 = 0x9D79BC39;
pub const QUERY_MAGIC: u32 = 0x2CA856F5;

/// An address in a local-discovery `Device`. An empty `ip` means "use the
/// packet's source address" and is only meaningful in `Announcement::self_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub ip: Vec<u8>,
    pub port: u16,
}

impl Address {
    pub fn use_source_ip(port: u16) -> Self {
        Self { ip: Vec::new(), port }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: [u8; 32],
    pub addresses: Vec<Address>,
}

/// A local-discovery broadcast/multicast packet, per §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub this_device: Device,
    pub extra: Vec<Device>,
}

fn encode_address(buf: &mut Vec<u8>, addr: &Address) {
    put_opaque(buf, &addr.ip);
    put_u32(buf, addr.port as u32);
}

fn decode_address(reader: &mut Reader<'_>) -> Result<Address> {
    let ip = reader.get_opaque()?;
    if !matches!(ip.len(), 0 | 4 | 16) {
        return Err(BepError::Protocol(format!(
            "address ip field is {} bytes, want 0, 4, or 16",
            ip.len()
        )));
    }
    let port = reader.get_u32()? as u16;
    Ok(Address { ip, port })
}

fn encode_device(buf: &mut Vec<u8>, device: &Device) {
    put_opaque(buf, &device.id);
    put_u32(buf, device.addresses.len() as u32);
    for addr in &device.addresses {
        encode_address(buf, addr);
    }
}

fn decode_device(reader: &mut Reader<'_>) -> Result<Device> {
    let id_bytes = reader.get_opaque()?;
    if id_bytes.len() != 32 {
        return Err(BepError::Protocol("discovery device id must be 32 bytes".into()));
    }
    let mut id = [0u8; 32];
    id.copy_from_slice(&id_bytes);
    let n = reader.get_u32()? as usize;
    let mut addresses = Vec::with_capacity(n.min(64));
    for _ in 0..n {
        addresses.push(decode_address(reader)?);
    }
    Ok(Device { id, addresses })
}

impl Announcement {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, ANNOUNCEMENT_MAGIC);
        encode_device(&mut buf, &self.this_device);
        put_u32(&mut buf, self.extra.len() as u32);
        for device in &self.extra {
            encode_device(&mut buf, device);
        }
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.get_u32()?;
        if magic != ANNOUNCEMENT_MAGIC {
            return Err(BepError::Protocol(format!(
                "bad announcement magic 0x{magic:08x}"
            )));
        }
        let this_device = decode_device(&mut reader)?;
        let n_extra = reader.get_u32()? as usize;
        let mut extra = Vec::with_capacity(n_extra.min(64));
        for _ in 0..n_extra {
            extra.push(decode_device(&mut reader)?);
        }
        Ok(Self { this_device, extra })
    }
}

/// A global-discovery lookup for a single device id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub device_id: [u8; 32],
}

impl Query {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u32(&mut buf, QUERY_MAGIC);
        put_opaque(&mut buf, &self.device_id);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.get_u32()?;
        if magic != QUERY_MAGIC {
            return Err(BepError::Protocol(format!("bad query magic 0x{magic:08x}")));
        }
        let device_id = reader.get_opaque()?;
        if device_id.len() != 32 {
            return Err(BepError::Protocol("query device id must be 32 bytes".into()));
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&device_id);
        Ok(Self { device_id: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_round_trips_with_source_ip_address() {
        let ann = Announcement {
            this_device: Device {
                id: [9u8; 32],
                addresses: vec![Address::use_source_ip(21027)],
            },
            extra: vec![],
        };
        let bytes = ann.encode();
        assert_eq!(Announcement::decode(&bytes).unwrap(), ann);
    }

    #[test]
    fn announcement_round_trips_with_explicit_ipv4_and_ipv6() {
        let ann = Announcement {
            this_device: Device {
                id: [1u8; 32],
                addresses: vec![
                    Address { ip: vec![10, 0, 1, 5], port: 22000 },
                    Address { ip: vec![0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1], port: 22000 },
                ],
            },
            extra: vec![Device { id: [2u8; 32], addresses: vec![] }],
        };
        let bytes = ann.encode();
        assert_eq!(Announcement::decode(&bytes).unwrap(), ann);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 0xDEADBEEF);
        assert!(Announcement::decode(&buf).is_err());
    }

    #[test]
    fn query_round_trips() {
        let query = Query { device_id: [42u8; 32] };
        let bytes = query.encode();
        assert_eq!(Query::decode(&bytes).unwrap(), query);
    }

    #[test]
    fn invalid_ip_length_is_rejected() {
        let mut buf = Vec::new();
        put_u32(&mut buf, ANNOUNCEMENT_MAGIC);
        put_opaque(&mut buf, &[1u8; 32]);
        put_u32(&mut buf, 1);
        put_opaque(&mut buf, &[1, 2, 3]); // 3-byte ip: invalid
        put_u32(&mut buf, 1234);
        put_u32(&mut buf, 0);
        assert!(Announcement::decode(&buf).is_err());
    }
}
