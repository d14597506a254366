//! Metrics collection and exposition.
//!
//! # Metrics
//! - `greenlight_admission_total` (counter): admission decisions by outcome
//! - `greenlight_rate_limit_clients` (gauge): tracked client buckets
//! - `greenlight_tokens_issued_total` (counter): issued credentials by scope
//! - `greenlight_token_auth_failures_total` (counter): rejected credentials by reason
//! - `greenlight_background_tasks_pending` (gauge): in-flight background tasks
//! - `greenlight_background_task_panics_total` (counter): contained task panics
//! - `greenlight_lifecycle_state` (gauge): 0=running, 1=draining, 2=stopped, 3=failed
//!
//! Recording is a no-op until a recorder is installed, so tests never need one.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "denied" };
    counter!("greenlight_admission_total", "outcome" => outcome).increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("greenlight_rate_limit_clients").set(count as f64);
}

pub fn record_token_issued(scope: &'static str) {
    counter!("greenlight_tokens_issued_total", "scope" => scope).increment(1);
}

pub fn record_token_rejected(reason: &'static str) {
    counter!("greenlight_token_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_background_pending(pending: usize) {
    gauge!("greenlight_background_tasks_pending").set(pending as f64);
}

pub fn record_background_panic(task: &'static str) {
    counter!("greenlight_background_task_panics_total", "task" => task).increment(1);
}

pub fn record_lifecycle_state(code: u8) {
    gauge!("greenlight_lifecycle_state").set(f64::from(code));
}
