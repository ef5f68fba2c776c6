use serde::Deserialize;

/// Points at this device's certificate and private key
/// ([`crate::tls::StaticTlsMaterial`]); certificate *generation* is out of
/// scope, so both files must already exist.
#[derive(Debug, Deserialize, Clone)]
pub struct TlsConfig {
    /// Path to this device's certificate file (PEM format).
    pub cert_path: String,
    /// Path to this device's private key file (PEM format).
    pub key_path: String,
}
