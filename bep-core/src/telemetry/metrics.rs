use std::sync::Arc;

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;

/// BEP core metrics, exported over Prometheus text format by
/// [`super::server::start_metrics_server`].
#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,
    pub connection_errors_total: Counter<u64>,

    pub blocks_served_total: Counter<u64>,
    pub blocks_received_total: Counter<u64>,
    pub block_bytes_transferred_total: Counter<u64>,
    pub block_request_duration_seconds: Histogram<f64>,

    pub nat_mappings_active: UpDownCounter<i64>,
    pub nat_renewal_failures_total: Counter<u64>,

    pub beacon_sends_total: Counter<u64>,
    pub beacon_send_failures_total: Counter<u64>,

    pub errors_total: Counter<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            connections_total: meter
                .u64_counter("bep_connections_total")
                .with_description("Total number of BEP connections established")
                .build(),
            connections_active: meter
                .i64_up_down_counter("bep_connections_active")
                .with_description("Number of active BEP connections")
                .build(),
            connection_errors_total: meter
                .u64_counter("bep_connection_errors_total")
                .with_description("Total number of connection failures")
                .build(),

            blocks_served_total: meter
                .u64_counter("bep_blocks_served_total")
                .with_description("Total number of blocks served to remote peers")
                .build(),
            blocks_received_total: meter
                .u64_counter("bep_blocks_received_total")
                .with_description("Total number of blocks received from remote peers")
                .build(),
            block_bytes_transferred_total: meter
                .u64_counter("bep_block_bytes_transferred_total")
                .with_description("Total bytes transferred in block requests/responses")
                .build(),
            block_request_duration_seconds: meter
                .f64_histogram("bep_block_request_duration_seconds")
                .with_description("Block request round-trip duration in seconds")
                .build(),

            nat_mappings_active: meter
                .i64_up_down_counter("bep_nat_mappings_active")
                .with_description("Number of currently held NAT mappings")
                .build(),
            nat_renewal_failures_total: meter
                .u64_counter("bep_nat_renewal_failures_total")
                .with_description("Total number of failed NAT mapping renewal attempts")
                .build(),

            beacon_sends_total: meter
                .u64_counter("bep_beacon_sends_total")
                .with_description("Total number of beacon announcements sent")
                .build(),
            beacon_send_failures_total: meter
                .u64_counter("bep_beacon_send_failures_total")
                .with_description("Total number of beacon sends that reached no destination")
                .build(),

            errors_total: meter
                .u64_counter("bep_errors_total")
                .with_description("Total number of errors across all subsystems")
                .build(),
        }
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter().with_registry(registry.clone()).build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();
    global::set_meter_provider(meter_provider);

    let meter = global::meter("bep-core");
    let metrics = Arc::new(Metrics::new(meter));

    Ok((metrics, registry))
}
