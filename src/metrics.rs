//! Prometheus metrics for request handling and app construction.
//!
//! Recording is a no-op until a recorder is installed (see `main.rs`).

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

// === Metric Name Constants ===

/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
/// Unmatched route counter metric name.
pub const METRIC_UNMATCHED_ROUTES: &str = "http_unmatched_routes_total";
/// Rejected request body counter metric name.
pub const METRIC_REJECTED_BODIES: &str = "http_rejected_bodies_total";
/// Applications built counter metric name.
pub const METRIC_APPS_BUILT: &str = "apps_built_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );
    describe_counter!(METRIC_HTTP_REQUESTS, "Total number of HTTP requests handled");
    describe_counter!(
        METRIC_UNMATCHED_ROUTES,
        "Total number of requests that matched no route"
    );
    describe_counter!(
        METRIC_REJECTED_BODIES,
        "Total number of request bodies rejected by a body parser"
    );
    describe_counter!(METRIC_APPS_BUILT, "Total number of applications built");

    debug!("Metrics initialized");
}

/// Record a completed HTTP request.
pub fn record_http_request(start: Instant, method: &str, status: u16) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = status.to_string();
    histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .record(latency_ms);
    counter!(METRIC_HTTP_REQUESTS, "method" => method.to_string(), "status" => status).increment(1);
}

/// Increment unmatched routes counter.
pub fn inc_unmatched_routes() {
    counter!(METRIC_UNMATCHED_ROUTES).increment(1);
}

/// Increment rejected bodies counter.
pub fn inc_rejected_bodies(reason: &'static str) {
    counter!(METRIC_REJECTED_BODIES, "reason" => reason).increment(1);
}

/// Increment applications built counter.
pub fn inc_apps_built() {
    counter!(METRIC_APPS_BUILT).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_noop() {
        init_metrics();
        record_http_request(Instant::now(), "GET", 200);
        inc_unmatched_routes();
        inc_rejected_bodies("too_large");
        inc_apps_built();
    }
}
