//! Prometheus export of the transport metrics.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Start the Prometheus metrics endpoint and describe the transport metrics.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tether_transport::metrics::describe_metrics();

    info!("Metrics server listening on {}", addr);
    Ok(())
}
