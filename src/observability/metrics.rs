//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_sent_total` (counter): outbound requests by sink
//! - `bridge_send_failures_total` (counter): connection-unavailable sends by URL
//! - `bridge_responses_delivered_total` (counter): correlated deliveries by status
//! - `bridge_lookup_miss_total` (counter): responses with no registered listener
//! - `bridge_events_dropped_total` (counter): dropped payloads by reason
//! - `bridge_inbound_requests_total` (counter): inbound requests by path
//! - `bridge_worker_pool_in_use` (gauge): busy worker slots
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request_sent(sink_id: &str) {
    counter!("bridge_requests_sent_total", "sink" => sink_id.to_string()).increment(1);
}

pub fn record_send_failure(url: &str) {
    counter!("bridge_send_failures_total", "url" => url.to_string()).increment(1);
}

pub fn record_response_delivered(status: u16) {
    counter!("bridge_responses_delivered_total", "status" => status.to_string()).increment(1);
}

pub fn record_lookup_miss(owner_id: &str) {
    counter!("bridge_lookup_miss_total", "owner" => owner_id.to_string()).increment(1);
}

pub fn record_dropped_event(reason: &'static str) {
    counter!("bridge_events_dropped_total", "reason" => reason).increment(1);
}

pub fn record_inbound_request(path: &str) {
    counter!("bridge_inbound_requests_total", "path" => path.to_string()).increment(1);
}

pub fn record_pool_in_use(in_use: usize) {
    gauge!("bridge_worker_pool_in_use").set(in_use as f64);
}
