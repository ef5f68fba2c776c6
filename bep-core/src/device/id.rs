use std::fmt;

use data_encoding::{Encoding, Specification};
use sha2::{Digest, Sha256};

use crate::error::{BepError, Result};

/// A device identity: the SHA-256 digest of the peer's X.509 certificate.
///
/// Equality is bytewise. [`DeviceId::LOCAL`] is a well-known sentinel (all
/// ones) used to name "this device" in internal per-folder maps, never a
/// value produced by hashing a real certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId([u8; 32]);

impl DeviceId {
    /// Sentinel naming the local device in internal maps.
    pub const LOCAL: DeviceId = DeviceId([0xFF; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives a device id from a DER-encoded X.509 certificate.
    pub fn from_certificate_der(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Formats the device id as the dashed, Luhn-checked 63-character form
    /// (8 groups of 7: 6 Base32 symbols plus one check digit, re-chunked).
    pub fn to_display_string(&self) -> String {
        chunkify(&luhnify(&base32_encode(&self.0)))
    }

    /// Parses any of the accepted textual forms: dashed or undashed 56-char
    /// (Luhn-checked) form, or the legacy undashed 52-char form. Accepts
    /// mixed case, whitespace, and the `0/1/8` vs `O/I/B` typo
    /// substitutions.
    pub fn parse(input: &str) -> Result<Self> {
        let cleaned: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .map(correct_typeo)
            .collect();

        let unchecked52 = match cleaned.len() {
            56 => deluhnify(&cleaned)?,
            52 => cleaned,
            other => {
                return Err(BepError::DeviceId(format!(
                    "unexpected device id length {other} (want 52 or 56 symbols)"
                )))
            }
        };

        let bytes = base32_decode(&unchecked52)?;
        if bytes.len() != 32 {
            return Err(BepError::DeviceId(format!(
                "decoded device id is {} bytes, want 32",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.to_display_string())
    }
}

fn correct_typeo(c: char) -> char {
    match c {
        '0' => 'O',
        '1' => 'I',
        '8' => 'B',
        other => other,
    }
}

fn base32_encoding() -> Encoding {
    let mut spec = Specification::new();
    spec.symbols.push_str("ABCDEFGHIJKLMNOPQRSTUVWXYZ234567");
    spec.encoding().expect("valid base32 specification")
}

fn base32_encode(bytes: &[u8]) -> String {
    base32_encoding().encode(bytes).trim_end_matches('=').to_string()
}

fn base32_decode(s: &str) -> Result<Vec<u8>> {
    base32_encoding()
        .decode(s.as_bytes())
        .map_err(|e| BepError::DeviceId(format!("invalid base32: {e}")))
}

/// Symbol index (0..32) of a Base32 character, per the RFC4648 alphabet.
fn symbol_index(c: char) -> Result<u8> {
    match c {
        'A'..='Z' => Ok(c as u8 - b'A'),
        '2'..='7' => Ok(c as u8 - b'2' + 26),
        other => Err(BepError::DeviceId(format!("invalid base32 symbol '{other}'"))),
    }
}

const LUHN_BASE: u32 = 32;

/// Generalized Luhn mod-N check symbol, computed the way `calmh/luhn` does
/// it: double every other symbol (starting with the first), fold the
/// doubled value's base-N digits back together, and take the complement of
/// the running sum mod N.
fn luhn32_check_symbol(symbols: &[u8]) -> u8 {
    let mut factor: u32 = 2;
    let mut sum: u32 = 0;
    for &c in symbols {
        let addend = factor * c as u32;
        let addend = (addend / LUHN_BASE) + (addend % LUHN_BASE);
        sum += addend;
        factor = if factor == 2 { 1 } else { 2 };
    }
    let remainder = sum % LUHN_BASE;
    ((LUHN_BASE - remainder) % LUHN_BASE) as u8
}

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Splits a 52-char Base32 string into four 13-char groups and appends one
/// Luhn check symbol to each, producing a contiguous 56-char string.
fn luhnify(s52: &str) -> String {
    debug_assert_eq!(s52.len(), 52);
    let mut out = String::with_capacity(56);
    for chunk in s52.as_bytes().chunks(13) {
        let symbols: Vec<u8> = chunk
            .iter()
            .map(|&b| symbol_index(b as char).expect("encoder output is valid base32"))
            .collect();
        let check = luhn32_check_symbol(&symbols);
        out.push_str(std::str::from_utf8(chunk).expect("ascii"));
        out.push(ALPHABET[check as usize] as char);
    }
    out
}

/// Inverse of [`luhnify`]: validates each group's check symbol and returns
/// the concatenated 52-char data string.
fn deluhnify(s56: &str) -> Result<String> {
    if s56.len() != 56 {
        return Err(BepError::DeviceId("luhn form must be 56 symbols".into()));
    }
    let mut out = String::with_capacity(52);
    for group in s56.as_bytes().chunks(14) {
        let (data, check) = group.split_at(13);
        let symbols: Vec<u8> = data
            .iter()
            .map(|&b| symbol_index(b as char))
            .collect::<Result<_>>()?;
        let expect = luhn32_check_symbol(&symbols);
        let got = symbol_index(check[0] as char)?;
        if got != expect {
            return Err(BepError::DeviceId(format!(
                "check digit mismatch in group '{}': got {}, want {}",
                std::str::from_utf8(group).unwrap_or("?"),
                ALPHABET[got as usize] as char,
                ALPHABET[expect as usize] as char
            )));
        }
        out.push_str(std::str::from_utf8(data).expect("ascii"));
    }
    Ok(out)
}

/// Splits a contiguous string into dash-separated 7-char chunks, matching
/// the on-wire display convention.
fn chunkify(s: &str) -> String {
    s.as_bytes()
        .chunks(7)
        .map(|c| std::str::from_utf8(c).expect("ascii"))
        .collect::<Vec<_>>()
        .join("-")
}
