//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_rpc_requests_total` (counter): node requests by method, outcome
//! - `registry_retries_total` (counter): transient-failure retries by operation
//! - `registry_nonce_reserved_total` (counter): nonces handed out
//! - `registry_submissions_total` (counter): submissions by outcome
//! - `registry_confirmations_total` (counter): watcher terminal states
//! - `registry_node_health` (gauge): 1=reachable, 0=unreachable

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rpc(method: &'static str, outcome: &'static str) {
    counter!("registry_rpc_requests_total", "method" => method, "outcome" => outcome).increment(1);
}

pub fn record_retry(operation: &'static str) {
    counter!("registry_retries_total", "operation" => operation).increment(1);
}

pub fn record_nonce_reserved() {
    counter!("registry_nonce_reserved_total").increment(1);
}

pub fn record_submission(outcome: &'static str) {
    counter!("registry_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_confirmation(state: &'static str) {
    counter!("registry_confirmations_total", "state" => state).increment(1);
}

pub fn record_node_health(healthy: bool) {
    gauge!("registry_node_health").set(if healthy { 1.0 } else { 0.0 });
}
