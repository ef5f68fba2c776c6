use thiserror::Error;

/// Errors that can occur anywhere in the BEP core.
///
/// The variants line up with the error kinds in the design: `Transport` and
/// `Protocol` are fatal to the connection that raised them, `Resource` is
/// surfaced to the remote peer rather than propagated, `Configuration` is
/// fatal at startup, and `Temporary` is retried by a supervisor.
#[derive(Error, Debug)]
pub enum BepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("resource unavailable: {0}")]
    Resource(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("temporary failure: {0}")]
    Temporary(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("no private key found in key file")]
    NoPrivateKey,

    #[error("no certificates found")]
    NoCertificates,

    #[error("device id error: {0}")]
    DeviceId(String),
}

pub type Result<T> = std::result::Result<T, BepError>;
