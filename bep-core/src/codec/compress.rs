use crate::error::{BepError, Result};

/// Threshold below which a payload is always sent uncompressed; matches the
/// "implementation threshold" the spec leaves open.
pub const COMPRESSION_THRESHOLD: usize = 128;

/// Compresses `payload` with LZ4 block compression, prefixing the 4-byte
/// big-endian uncompressed length the wire format requires (distinct from
/// `lz4_flex`'s own length-prefixed convention, which we don't use).
pub fn compress(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len() / 2);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&lz4_flex::block::compress(payload));
    out
}

/// Reverses [`compress`]: reads the 4-byte uncompressed length, then
/// decompresses exactly that many bytes, failing on any size mismatch.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    if compressed.len() < 4 {
        return Err(BepError::Protocol("compressed frame missing length prefix".into()));
    }
    let (len_bytes, body) = compressed.split_at(4);
    let uncompressed_len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
    lz4_flex::block::decompress(body, uncompressed_len)
        .map_err(|e| BepError::Protocol(format!("lz4 decompression failed: {e}")))
}

/// Decides whether an outbound frame should be compressed: below threshold,
/// never; otherwise only if the compressed form (plus its length prefix) is
/// strictly smaller than the uncompressed payload.
pub fn should_compress(payload: &[u8]) -> Option<Vec<u8>> {
    if payload.len() < COMPRESSION_THRESHOLD {
        return None;
    }
    let compressed = compress(payload);
    if compressed.len() < payload.len() {
        Some(compressed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_compressible_payload() {
        let payload = vec![b'a'; 10_000];
        let compressed = compress(&payload);
        assert!(compressed.len() < payload.len());
        assert_eq!(decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn round_trips_random_payload() {
        let mut payload = vec![0u8; 4096];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i * 2654435761u32 as usize) as u8;
        }
        let compressed = compress(&payload);
        assert_eq!(decompress(&compressed).unwrap(), payload);
    }

    #[test]
    fn should_compress_rejects_small_payloads() {
        assert!(should_compress(&[0u8; 10]).is_none());
    }

    #[test]
    fn should_compress_rejects_incompressible_payloads_that_would_grow() {
        // High-entropy payload just above threshold: LZ4 + the 4-byte prefix
        // will typically not beat the original size.
        let mut payload = vec![0u8; 200];
        for (i, b) in payload.iter_mut().enumerate() {
            *b = (i as u32).wrapping_mul(2654435761).to_be_bytes()[0];
        }
        if let Some(compressed) = should_compress(&payload) {
            assert!(compressed.len() < payload.len());
        }
    }

    #[test]
    fn decompress_rejects_missing_prefix() {
        assert!(decompress(&[1, 2, 3]).is_err());
    }
}
