//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hotenv_reloads_total` (counter): reloads by source and outcome
//! - `hotenv_db_connect_total` (counter): connect attempts by outcome
//! - `hotenv_db_connected` (gauge): 1 while a pool is published
//! - `hotenv_server_restarts_total` (counter): listener restarts by outcome
//! - `hotenv_requests_total` (counter): requests by method, status
//! - `hotenv_request_duration_seconds` (histogram): request latency
//!
//! Recording is a no-op until a recorder is installed, so tests never need
//! an exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_reload(source: &'static str, success: bool) {
    counter!(
        "hotenv_reloads_total",
        "source" => source,
        "outcome" => outcome(success)
    )
    .increment(1);
}

pub fn record_db_connect(success: bool) {
    counter!("hotenv_db_connect_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_db_connected(connected: bool) {
    gauge!("hotenv_db_connected").set(if connected { 1.0 } else { 0.0 });
}

pub fn record_restart(success: bool) {
    counter!("hotenv_server_restarts_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    counter!(
        "hotenv_requests_total",
        "method" => method.clone(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "hotenv_request_duration_seconds",
        "method" => method,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
