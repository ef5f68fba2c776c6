//! The per-peer BEP connection (§4.4): state machine, outstanding-request
//! table, the reader/writer/pinger task triad, and the manager that tracks
//! all live connections for a process.

mod bep_connection;
mod guards;
mod manager;
mod outstanding;
mod state;

pub use bep_connection::{spawn, BepConnection, PingConfig};
pub use guards::ConnectionGuard;
pub use manager::ConnectionManager;
pub use outstanding::OutstandingRequests;
pub use state::ConnectionState;
