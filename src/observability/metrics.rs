//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_headers_enqueued_total` (counter): headers handed to the batcher
//! - `relay_puller_height` (gauge): height of the last enqueued header
//! - `relay_headers_submitted_total` (counter): headers submitted, by shape
//! - `relay_transactions_dispatched_total` (counter): broadcasts, by method
//! - `relay_transaction_failures_total` (counter): settlement failures, by reason
//! - `relay_preflight_retries_total` (counter): advancement preflight retries
//! - `relay_nonce_next` (gauge): next nonce to be allocated
//! - `relay_best_height` (gauge): height of the last header marked best

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Serving metrics");
    Ok(())
}

pub fn record_header_enqueued(height: u64) {
    metrics::counter!("relay_headers_enqueued_total").increment(1);
    metrics::gauge!("relay_puller_height").set(height as f64);
}

pub fn record_headers_submitted(shape: &'static str, count: usize) {
    metrics::counter!("relay_headers_submitted_total", "shape" => shape).increment(count as u64);
}

pub fn record_transaction_dispatched(method: &'static str) {
    metrics::counter!("relay_transactions_dispatched_total", "method" => method).increment(1);
}

pub fn record_transaction_failure(reason: &'static str) {
    metrics::counter!("relay_transaction_failures_total", "reason" => reason).increment(1);
}

pub fn record_preflight_retry() {
    metrics::counter!("relay_preflight_retries_total").increment(1);
}

pub fn record_next_nonce(nonce: u64) {
    metrics::gauge!("relay_nonce_next").set(nonce as f64);
}

pub fn record_best_height(height: u64) {
    metrics::gauge!("relay_best_height").set(height as f64);
}
