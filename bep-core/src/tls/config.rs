use std::sync::Arc;

use tokio_rustls::rustls::crypto::CryptoProvider;
use tokio_rustls::rustls::{ClientConfig, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::{BepError, Result};
use crate::tls::material::TlsMaterial;
use crate::tls::verifier::AcceptAnyCertVerifier;

/// Builds the server-side TLS acceptor for incoming BEP connections.
/// Client certificates are required but not chain-validated: device
/// identity is confirmed post-handshake by comparing the peer
/// certificate's hash against an expected or allowed device id.
pub fn build_acceptor(material: &dyn TlsMaterial) -> Result<TlsAcceptor> {
    let verifier = Arc::new(AcceptAnyCertVerifier::new(current_provider()));

    let mut server = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(material.certificate_chain().to_vec(), material.private_key().clone_key())
        .map_err(|e| BepError::Tls(format!("failed to build server TLS config: {e}")))?;

    server.alpn_protocols = vec![b"bep/1.0".to_vec()];
    Ok(TlsAcceptor::from(Arc::new(server)))
}

/// Builds the client-side TLS connector used when this device dials a peer.
pub fn build_connector(material: &dyn TlsMaterial) -> Result<TlsConnector> {
    let verifier = Arc::new(AcceptAnyCertVerifier::new(current_provider()));

    let mut client = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(material.certificate_chain().to_vec(), material.private_key().clone_key())
        .map_err(|e| BepError::Tls(format!("failed to build client TLS config: {e}")))?;

    client.alpn_protocols = vec![b"bep/1.0".to_vec()];
    Ok(TlsConnector::from(Arc::new(client)))
}

/// Falls back to the `ring` provider if no process-level default has been
/// installed yet (normally done once at startup in `bep-node`).
fn current_provider() -> CryptoProvider {
    CryptoProvider::get_default()
        .map(|p| (**p).clone())
        .unwrap_or_else(|| tokio_rustls::rustls::crypto::ring::default_provider())
}
