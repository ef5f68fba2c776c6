use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::compress::{decompress, should_compress};
use crate::codec::header::{FrameHeader, MessageType, HEADER_LEN, PROTOCOL_VERSION};
use crate::codec::message::Message;
use crate::error::{BepError, Result};

/// Largest payload we are willing to buffer for a single frame. The spec
/// caps `Response.data` at 256 KiB; this gives headroom for ClusterConfig
/// and Index messages describing large folders while still bounding memory
/// a malicious or buggy peer can force us to allocate.
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// Allocates and assigns the next message ID for an outbound frame, wrapping
/// in the header's 12-bit space.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    next: u16,
}

impl MessageIdAllocator {
    pub fn next(&mut self) -> u16 {
        let id = self.next;
        self.next = (self.next + 1) % 4096;
        id
    }
}

/// A outbound message paired with the message ID its header should carry.
/// Responses and Pongs reuse the id of the request/ping they answer;
/// everything else gets the next id from the connection's allocator.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u16,
    pub message: Message,
}

/// `tokio_util::codec` implementation of the BEP wire format: header parsing,
/// optional LZ4 decompression, and XDR body decoding on the way in; the
/// mirror image on the way out.
#[derive(Debug, Default)]
pub struct BepCodec {
    header: Option<FrameHeader>,
}

impl Decoder for BepCodec {
    type Item = Frame;
    type Error = BepError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let header = match self.header {
            Some(h) => h,
            None => {
                if src.len() < HEADER_LEN {
                    src.reserve(HEADER_LEN - src.len());
                    return Ok(None);
                }
                let mut bytes = [0u8; HEADER_LEN];
                bytes.copy_from_slice(&src[..HEADER_LEN]);
                let header = FrameHeader::decode(bytes)?;
                if header.payload_length > MAX_PAYLOAD_LEN {
                    return Err(BepError::Protocol(format!(
                        "frame payload length {} exceeds maximum {MAX_PAYLOAD_LEN}",
                        header.payload_length
                    )));
                }
                src.advance(HEADER_LEN);
                self.header = Some(header);
                header
            }
        };

        let len = header.payload_length as usize;
        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(len);
        self.header = None;

        let body = if header.compressed {
            decompress(&payload)?
        } else {
            payload.to_vec()
        };

        let message_type = MessageType::from_u8(header.message_type)?;
        let message = Message::decode_body(message_type, &body)?;
        Ok(Some(Frame { id: header.message_id, message }))
    }
}

impl Encoder<Frame> for BepCodec {
    type Error = BepError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let message_type = frame.message.message_type();
        let body = frame.message.encode_body();

        let (compressed, payload) = match should_compress(&body) {
            Some(compact) => (true, compact),
            None => (false, body),
        };

        if payload.len() as u64 > MAX_PAYLOAD_LEN as u64 {
            return Err(BepError::Protocol(format!(
                "outbound payload of {} bytes exceeds maximum {MAX_PAYLOAD_LEN}",
                payload.len()
            )));
        }

        let header = FrameHeader {
            version: PROTOCOL_VERSION,
            message_id: frame.id,
            message_type: message_type as u8,
            compressed,
            payload_length: payload.len() as u32,
        };

        dst.extend_from_slice(&header.encode());
        dst.extend_from_slice(&payload);
        Ok(())
    }
}
