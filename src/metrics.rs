use anyhow::{Context, Result};
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::info;

/// Install the Prometheus recorder.
/// Returns a handle that renders the current metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Background task updating uptime and memory gauges every 5 seconds
pub async fn process_metrics_task() {
    let start_time = Instant::now();

    loop {
        metrics::gauge!("process.uptime.seconds").set(start_time.elapsed().as_secs() as f64);
        metrics::gauge!("process.is_up").set(1.0);

        #[cfg(target_os = "linux")]
        {
            if let Ok(status) = std::fs::read_to_string("/proc/self/status")
                && let Some(line) = status.lines().find(|l| l.starts_with("VmRSS:"))
                && let Some(kb_str) = line.split_whitespace().nth(1)
                && let Ok(kb) = kb_str.parse::<f64>()
            {
                metrics::gauge!("process.memory.bytes").set(kb * 1024.0);
            }
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

/// Zero every session metric so they are exported before the first event
pub fn initialize_session_metrics() {
    metrics::counter!("aprs.connection.established_total").absolute(0);
    metrics::gauge!("aprs.connection.state").set(0.0);

    metrics::counter!("aprs.login.sent_total").absolute(0);

    metrics::counter!("aprs.raw_message.received.server_total").absolute(0);
    metrics::counter!("aprs.raw_message.received.aprs_total").absolute(0);

    metrics::counter!("aprs.packet.decoded_total").absolute(0);
    metrics::counter!("aprs.packet.decode_error_total").absolute(0);
}

/// Serve `/metrics` on `port` until the listener fails
pub async fn start_metrics_server(port: u16) -> Result<()> {
    let handle = init_metrics()?;

    tokio::spawn(process_metrics_task());

    let app = Router::new().route("/metrics", get(move || async move { handle.render() }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics server to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("metrics server failed")
}
