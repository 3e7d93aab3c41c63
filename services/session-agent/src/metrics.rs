//! Prometheus metrics exposition
//!
//! The agent records:
//!
//! - `agent_requests_total` (counter): labels `route`, `status`
//!
//! and renders the lifecycle counters the session core emits
//! (`session_refresh_total`, `session_refresh_coalesced_total`,
//! `session_terminations_total`) through the same recorder.

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record a served agent request by matched route and status code.
pub fn record_request(route: &str, status: u16) {
    metrics::counter!(
        "agent_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
