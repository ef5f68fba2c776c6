//! TLS setup for BEP connections. Every BEP peer both dials and accepts, and
//! peers authenticate each other by certificate fingerprint
//! ([`crate::device::DeviceId`]) rather than a CA chain, so both the server
//! and client configs use [`verifier::AcceptAnyCertVerifier`] and require
//! mutual certificates.

mod config;
mod material;
mod verifier;

pub use config::{build_acceptor, build_connector};
pub use material::{StaticTlsMaterial, TlsMaterial};
pub use verifier::AcceptAnyCertVerifier;
