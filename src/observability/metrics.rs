//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_requests_total` (counter): requests by method, status
//! - `mirror_request_duration_seconds` (histogram): latency by method
//!
//! Recorded by [`track_requests`], which wraps the whole router, so 404, 405,
//! timeout and panic responses are counted alongside mirror reports.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("mirror_requests_total", "Mirror requests by method and status");
    describe_histogram!(
        "mirror_request_duration_seconds",
        "Time from request arrival to response"
    );

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Middleware recording the method, final status and latency of every request.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;

    record_request(method.as_str(), response.status().as_u16(), start_time);
    response
}

/// Record one handled request. A no-op until a recorder is installed.
pub fn record_request(method: &str, status: u16, start_time: Instant) {
    counter!(
        "mirror_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "mirror_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start_time.elapsed().as_secs_f64());
}
