pub mod metrics;
pub mod server;
pub mod tracing;

pub use metrics::{init_metrics, Metrics};
pub use server::start_metrics_server;
pub use tracing::{init_tracing_with_otel, shutdown_tracing};
