//! Metrics collection and exposition.
//!
//! # Metrics
//! - `control_requests_total` (counter): requests by route (`rpc`, `http`)
//! - `control_credential_renewals_total` (counter): renewals by result
//! - `control_certificate_refreshes_total` (counter): refreshes by result
//! - `control_jobs_total` (counter): job executions by job and result
//! - `control_certificate_expiry_seconds` (gauge): expiry of the serving certificate
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of global state
//! - The Prometheus recorder is installed by the binary and rendered on the
//!   health listener

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

fn result_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// Install the global Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a request dispatched by the multiplexer.
pub fn record_route(route: &'static str) {
    counter!("control_requests_total", "route" => route).increment(1);
}

/// Record a credential renewal attempt.
pub fn record_credential_renewal(ok: bool) {
    counter!("control_credential_renewals_total", "result" => result_label(ok)).increment(1);
}

/// Record a certificate refresh attempt.
pub fn record_certificate_refresh(ok: bool) {
    counter!("control_certificate_refreshes_total", "result" => result_label(ok)).increment(1);
}

/// Record a background job execution.
pub fn record_job(job: &str, ok: bool) {
    counter!(
        "control_jobs_total",
        "job" => job.to_string(),
        "result" => result_label(ok)
    )
    .increment(1);
}

/// Record the expiry of the currently installed certificate (unix seconds).
pub fn record_certificate_expiry(unix_secs: i64) {
    gauge!("control_certificate_expiry_seconds").set(unix_secs as f64);
}
