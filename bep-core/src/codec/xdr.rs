use crate::error::{BepError, Result};

/// Number of zero bytes needed so that `n + pad(n)` is a multiple of 4.
pub fn pad(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

/// Appends a big-endian `u32`.
pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Appends a big-endian `u64`.
pub fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Appends an XDR opaque byte string: a `u32` length followed by the bytes,
/// zero-padded to a 4-byte boundary (padding does not count toward length).
pub fn put_opaque(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + pad(bytes.len()), 0);
}

/// Appends a UTF-8 NFC string using the same opaque-string encoding.
pub fn put_string(buf: &mut Vec<u8>, s: &str) {
    put_opaque(buf, s.as_bytes());
}

/// A cursor over an XDR-encoded byte slice.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(BepError::Protocol(format!(
                "unexpected end of message: need {n} bytes, have {}",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        Ok(self.get_u64()? as i64)
    }

    pub fn get_opaque(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        let bytes = self.take(len)?.to_vec();
        let skip = pad(len);
        if skip > 0 {
            self.take(skip)?;
        }
        Ok(bytes)
    }

    pub fn get_string(&mut self) -> Result<String> {
        let bytes = self.get_opaque()?;
        String::from_utf8(bytes)
            .map_err(|e| BepError::Protocol(format!("field is not valid UTF-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_matches_spec_examples() {
        assert_eq!(pad(0), 0);
        assert_eq!(pad(1), 3);
        assert_eq!(pad(4), 0);
        assert_eq!(pad(33), 3);
        for n in 0..100 {
            assert_eq!((n + pad(n)) % 4, 0);
            assert!(pad(n) < 4);
        }
    }

    #[test]
    fn opaque_round_trips() {
        for len in [0usize, 1, 3, 4, 5, 131_072] {
            let data = vec![0xABu8; len];
            let mut buf = Vec::new();
            put_opaque(&mut buf, &data);
            assert_eq!(buf.len() % 4, 0);
            let mut reader = Reader::new(&buf);
            assert_eq!(reader.get_opaque().unwrap(), data);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn string_round_trips_utf8_nfc() {
        let s = "caf\u{e9}/dossier";
        let mut buf = Vec::new();
        put_string(&mut buf, s);
        let mut reader = Reader::new(&buf);
        assert_eq!(reader.get_string().unwrap(), s);
    }

    #[test]
    fn truncated_opaque_is_an_error() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 10);
        buf.extend_from_slice(&[1, 2, 3]);
        let mut reader = Reader::new(&buf);
        assert!(reader.get_opaque().is_err());
    }
}
