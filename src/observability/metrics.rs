//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sentinel_simulations_total` (counter): pre-flight outcomes by result
//! - `sentinel_submissions_total` (counter): terminal outcomes by action, result
//! - `sentinel_confirmation_seconds` (histogram): submit-to-terminal latency
//! - `sentinel_policy_engine_connected` (gauge): 1=linked, 0=offline
//! - `sentinel_rpc_failovers_total` (counter): provider failovers by method
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_simulation(outcome: &'static str) {
    counter!("sentinel_simulations_total", "outcome" => outcome).increment(1);
}

pub fn record_submission(action: &'static str, outcome: &'static str) {
    counter!("sentinel_submissions_total", "action" => action, "outcome" => outcome).increment(1);
}

pub fn record_confirmation_latency(action: &'static str, seconds: f64) {
    histogram!("sentinel_confirmation_seconds", "action" => action).record(seconds);
}

pub fn record_engine_connected(connected: bool) {
    gauge!("sentinel_policy_engine_connected").set(if connected { 1.0 } else { 0.0 });
}

pub fn record_rpc_failover(method: &'static str) {
    counter!("sentinel_rpc_failovers_total", "method" => method).increment(1);
}
