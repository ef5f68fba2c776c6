//! Two-peer TLS handshake over a real loopback TCP connection, using
//! `rcgen` test certificates the way the teacher's `tests/tls/acceptor.rs`
//! does. Confirms the "accept any certificate, authenticate post-handshake
//! by comparing the derived `DeviceId`" model from §3/§4.4: both sides
//! derive the *other* side's device id from its peer certificate, and that
//! id matches the id the peer itself derives from its own leaf certificate.

use bep_core::device::DeviceId;
use bep_core::tls::{build_acceptor, build_connector, TlsMaterial};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use tokio::net::{TcpListener, TcpStream};

struct GeneratedMaterial {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsMaterial for GeneratedMaterial {
    fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }
}

fn generate_material() -> (GeneratedMaterial, DeviceId) {
    let rcgen::CertifiedKey { cert, signing_key } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = CertificateDer::from(cert.der().to_vec());
    let device_id = DeviceId::from_certificate_der(cert_der.as_ref());
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(signing_key.serialize_der()));
    (GeneratedMaterial { chain: vec![cert_der], key }, device_id)
}

#[tokio::test]
async fn mutual_handshake_derives_matching_device_ids() {
    let _ = tokio_rustls::rustls::crypto::ring::default_provider().install_default();

    let (server_material, server_device_id) = generate_material();
    let (client_material, client_device_id) = generate_material();

    let acceptor = build_acceptor(&server_material).unwrap();
    let connector = build_connector(&client_material).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let tls_stream = acceptor.accept(stream).await.unwrap();
        let certs = tls_stream.get_ref().1.peer_certificates().unwrap();
        DeviceId::from_certificate_der(certs.first().unwrap().as_ref())
    });

    let client = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await.unwrap();
        let server_name = ServerName::try_from("localhost").unwrap();
        let tls_stream = connector.connect(server_name, stream).await.unwrap();
        let (_, session) = tls_stream.get_ref();
        let certs = session.peer_certificates().unwrap();
        DeviceId::from_certificate_der(certs.first().unwrap().as_ref())
    });

    let observed_client_id_by_server = server.await.unwrap();
    let observed_server_id_by_client = client.await.unwrap();

    assert_eq!(observed_client_id_by_server, client_device_id);
    assert_eq!(observed_server_id_by_client, server_device_id);
    assert_ne!(client_device_id, server_device_id);
}
