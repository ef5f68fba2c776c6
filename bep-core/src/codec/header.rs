use crate::error::{BepError, Result};

/// Protocol version carried in every frame header; the only value this
/// implementation accepts.
pub const PROTOCOL_VERSION: u8 = 0;

/// BEP message types, as they appear in the header's Message Type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    ClusterConfig = 0,
    Index = 1,
    Request = 2,
    Response = 3,
    Ping = 4,
    Pong = 5,
    IndexUpdate = 6,
    Close = 7,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::ClusterConfig,
            1 => Self::Index,
            2 => Self::Request,
            3 => Self::Response,
            4 => Self::Ping,
            5 => Self::Pong,
            6 => Self::IndexUpdate,
            7 => Self::Close,
            other => return Err(BepError::Protocol(format!("unknown message type {other}"))),
        })
    }
}

/// Packs the version/id/type triple into the first 3 bytes of a BEP header,
/// in isolation from the compression flag and payload length.
///
/// `version` MUST be `< 16`, `id` MUST be `< 4096`, `type_` MUST be `< 256`.
pub fn encode_header(version: u8, id: u16, type_: u8) -> [u8; 3] {
    debug_assert!(version < 16);
    debug_assert!(id < 4096);
    let b0 = (version << 4) | ((id >> 8) as u8 & 0x0F);
    let b1 = (id & 0xFF) as u8;
    [b0, b1, type_]
}

pub fn decode_header(bytes: [u8; 3]) -> (u8, u16, u8) {
    let version = bytes[0] >> 4;
    let id = (((bytes[0] & 0x0F) as u16) << 8) | bytes[1] as u16;
    let type_ = bytes[2];
    (version, id, type_)
}

/// The full 8-byte BEP frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub message_id: u16,
    pub message_type: u8,
    pub compressed: bool,
    pub payload_length: u32,
}

pub const HEADER_LEN: usize = 8;

impl FrameHeader {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let [b0, b1, b2] = encode_header(self.version, self.message_id, self.message_type);
        let b3 = if self.compressed { 0x01 } else { 0x00 };
        let len = self.payload_length.to_be_bytes();
        [b0, b1, b2, b3, len[0], len[1], len[2], len[3]]
    }

    pub fn decode(bytes: [u8; HEADER_LEN]) -> Result<Self> {
        let (version, message_id, message_type) =
            decode_header([bytes[0], bytes[1], bytes[2]]);
        if version != PROTOCOL_VERSION {
            return Err(BepError::Protocol(format!(
                "unsupported protocol version {version}"
            )));
        }
        let compressed = match bytes[3] {
            0 => false,
            1 => true,
            other => {
                return Err(BepError::Protocol(format!(
                    "reserved header bits set: 0x{other:02x}"
                )))
            }
        };
        let payload_length = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { version, message_id, message_type, compressed, payload_length })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_triple_round_trips_across_full_ranges() {
        for version in 0u8..16 {
            for id in [0u16, 1, 2047, 4095] {
                for type_ in [0u8, 1, 127, 255] {
                    let encoded = encode_header(version, id, type_);
                    assert_eq!(decode_header(encoded), (version, id, type_));
                }
            }
        }
    }

    #[test]
    fn full_frame_header_round_trips() {
        let header = FrameHeader {
            version: 0,
            message_id: 4095,
            message_type: 2,
            compressed: true,
            payload_length: 131_072,
        };
        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(FrameHeader::decode(bytes).unwrap(), header);
    }

    #[test]
    fn non_zero_version_is_rejected() {
        let mut bytes = FrameHeader {
            version: 0,
            message_id: 1,
            message_type: 0,
            compressed: false,
            payload_length: 0,
        }
        .encode();
        bytes[0] |= 0x20; // set version nibble to 2
        assert!(FrameHeader::decode(bytes).is_err());
    }

    #[test]
    fn reserved_bits_set_is_rejected() {
        let mut bytes = FrameHeader {
            version: 0,
            message_id: 1,
            message_type: 0,
            compressed: false,
            payload_length: 0,
        }
        .encode();
        bytes[3] = 0x02;
        assert!(FrameHeader::decode(bytes).is_err());
    }

    #[test]
    fn message_type_from_u8_rejects_unknown() {
        assert!(MessageType::from_u8(8).is_err());
        assert_eq!(MessageType::from_u8(4).unwrap(), MessageType::Ping);
    }
}
