//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): dispatches by method and outcome
//! - `api_request_duration_seconds` (histogram): dispatch latency by method
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; a no-op until an exporter is installed
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::Verb;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Label for a request method. Anything outside the known verbs shares
/// one bucket so clients cannot mint new series.
pub fn method_label(method: &str) -> &'static str {
    match method.parse::<Verb>() {
        Ok(verb) => verb.as_str(),
        Err(_) => "OTHER",
    }
}

/// Record one dispatch.
pub fn record_dispatch(method: &str, outcome: &'static str, start: Instant) {
    let method = method_label(method);
    metrics::counter!("api_requests_total", "method" => method, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("api_request_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_label_buckets_unknown_methods() {
        assert_eq!(method_label("GET"), "get");
        assert_eq!(method_label("options"), "options");
        assert_eq!(method_label("PURGE"), "OTHER");
        assert_eq!(method_label("FOO1"), "OTHER");
        assert_eq!(method_label(""), "OTHER");
    }

    #[test]
    fn test_record_dispatch_without_exporter() {
        // No recorder installed: recording is a no-op
        record_dispatch("FOO2", "not_found", Instant::now());
    }
}
