use serde::Deserialize;

/// Connection-lifecycle timing (§4.4, §9 Design Notes).
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    /// How long a connection may sit idle before a `Ping` is sent.
    /// Default: 300 seconds (5 minutes).
    #[serde(default = "default_ping_idle_secs")]
    pub ping_idle_secs: u64,
    /// How long after sending a `Ping` with no traffic before the
    /// connection is closed. Default: 120 seconds (2 minutes).
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    /// TLS handshake timeout in seconds.
    /// Default: 15 seconds.
    #[serde(default = "default_tls_handshake_secs")]
    pub tls_handshake_secs: u64,
    /// Graceful shutdown budget for in-flight connections and control
    /// loops. Default: 30 seconds.
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ping_idle_secs: default_ping_idle_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            tls_handshake_secs: default_tls_handshake_secs(),
            shutdown_secs: default_shutdown_secs(),
        }
    }
}

fn default_ping_idle_secs() -> u64 {
    300
}

fn default_ping_timeout_secs() -> u64 {
    120
}

fn default_tls_handshake_secs() -> u64 {
    15
}

fn default_shutdown_secs() -> u64 {
    30
}
