use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{BepError, Result};

/// Stands in for "TLS certificate generation and loading", which is out of
/// scope here: supplies an already-loaded certificate chain and private key
/// to [`super::build_server_config`]/[`super::build_client_config`].
pub trait TlsMaterial: Send + Sync {
    fn certificate_chain(&self) -> &[CertificateDer<'static>];
    fn private_key(&self) -> &PrivateKeyDer<'static>;
}

/// [`TlsMaterial`] loaded once from a PEM certificate and key file on disk.
pub struct StaticTlsMaterial {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl StaticTlsMaterial {
    pub fn load(cert_path: &str, key_path: &str) -> Result<Self> {
        let cert_bytes = std::fs::read(cert_path).map_err(BepError::Io)?;
        let chain: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(&cert_bytes)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BepError::Tls(format!("failed to parse certificate: {e}")))?;
        if chain.is_empty() {
            return Err(BepError::NoCertificates);
        }

        let key_bytes = std::fs::read(key_path).map_err(BepError::Io)?;
        let mut keys: Vec<PrivateKeyDer<'static>> = PrivateKeyDer::pem_slice_iter(&key_bytes)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| BepError::Tls(format!("failed to parse private key: {e}")))?;
        let Some(key) = keys.pop() else {
            return Err(BepError::NoPrivateKey);
        };

        Ok(Self { chain, key })
    }

    pub fn leaf_certificate_der(&self) -> &CertificateDer<'static> {
        &self.chain[0]
    }
}

impl TlsMaterial for StaticTlsMaterial {
    fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }
}
