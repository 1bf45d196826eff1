//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_verdicts_total` (counter): verdicts by stage, reason, status
//! - `gate_pipeline_duration_seconds` (histogram): time spent in the pipeline
//! - `gate_rate_limit_evictions_total` (counter): windows dropped by cause
//! - `gate_jwks_refresh_total` (counter): key set refreshes by outcome
//!
//! Updates go through the `metrics` facade and are no-ops until a recorder
//! is installed, so library users and tests pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_verdict(stage: &'static str, reason: &'static str, status: u16) {
    metrics::counter!(
        "gate_verdicts_total",
        "stage" => stage,
        "reason" => reason,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_pipeline_duration(start: Instant) {
    metrics::histogram!("gate_pipeline_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limit_evictions(cause: &'static str, count: usize) {
    metrics::counter!("gate_rate_limit_evictions_total", "cause" => cause)
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

pub fn record_key_refresh(outcome: &'static str) {
    metrics::counter!("gate_jwks_refresh_total", "outcome" => outcome).increment(1);
}
