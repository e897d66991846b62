//! Prometheus metrics for the request pipeline.
//!
//! Metrics are exposed via a dedicated HTTP endpoint (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_authentications_total` - Authentication outcomes (labels: scheme, outcome)
//! - `gateway_authorization_denials_total` - Policy denials (labels: policy, status)
//! - `gateway_forwarded_header_errors_total` - Malformed proxy headers (label: header)
//! - `gateway_panics_total` - Panics caught at the top of the stack
//!
//! ## Histograms
//! - `gateway_pipeline_duration_seconds` - Time from pipeline entry to response (label: status)
//! - `gateway_route_duration_seconds` - Per-route named timers (label: timer)
//!
//! Authentication outcomes separate lifetime failures (`lifetime_error`) from
//! other token failures (`invalid_token`), which callers cannot tell apart.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gateway_pipeline::metrics::{init_metrics, record_authentication};
//!
//! // Initialize metrics (call once at startup)
//! init_metrics(addr)?;
//!
//! // Record from pipeline stages
//! record_authentication("Bearer", "success");
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const AUTHENTICATIONS_TOTAL: &str = "gateway_authentications_total";
    pub const AUTHORIZATION_DENIALS_TOTAL: &str = "gateway_authorization_denials_total";
    pub const FORWARDED_HEADER_ERRORS_TOTAL: &str = "gateway_forwarded_header_errors_total";
    pub const PANICS_TOTAL: &str = "gateway_panics_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "gateway_pipeline_duration_seconds";
    pub const ROUTE_DURATION_SECONDS: &str = "gateway_route_duration_seconds";
}

/// Initialize the Prometheus metrics exporter.
///
/// This sets up metric descriptions and starts the Prometheus HTTP listener
/// on the specified address.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. port in use).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::AUTHENTICATIONS_TOTAL,
        "Authentication attempts by scheme and outcome"
    );
    describe_counter!(
        names::AUTHORIZATION_DENIALS_TOTAL,
        "Requests denied by an authorization policy"
    );
    describe_counter!(
        names::FORWARDED_HEADER_ERRORS_TOTAL,
        "Requests rejected for a malformed forwarding header"
    );
    describe_counter!(
        names::PANICS_TOTAL,
        "Panics caught by the top-level handler"
    );

    describe_histogram!(
        names::PIPELINE_DURATION_SECONDS,
        "Time from pipeline entry to response in seconds"
    );
    describe_histogram!(
        names::ROUTE_DURATION_SECONDS,
        "Time spent inside a named route timer in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Counter Recording Functions
// =============================================================================

/// Record an authentication outcome (`success`, `lifetime_error`, ...).
pub fn record_authentication(scheme: &str, outcome: &str) {
    counter!(names::AUTHENTICATIONS_TOTAL, "scheme" => scheme.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record a policy denial.
pub fn record_authorization_denial(policy: &str, status: u16) {
    counter!(names::AUTHORIZATION_DENIALS_TOTAL, "policy" => policy.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a malformed forwarding header.
pub fn record_forwarded_header_error(header: &str) {
    counter!(names::FORWARDED_HEADER_ERRORS_TOTAL, "header" => header.to_string()).increment(1);
}

pub fn record_panic() {
    counter!(names::PANICS_TOTAL).increment(1);
}

// =============================================================================
// Histogram Recording Functions
// =============================================================================

/// Record total pipeline duration.
pub fn record_pipeline_duration(status: u16, duration_secs: f64) {
    histogram!(names::PIPELINE_DURATION_SECONDS, "status" => status.to_string())
        .record(duration_secs);
}

/// Record the elapsed time of a named route timer.
pub fn record_route_duration(timer: &str, duration_secs: f64) {
    histogram!(names::ROUTE_DURATION_SECONDS, "timer" => timer.to_string()).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recording without an installed recorder is a no-op; these only check
    // that nothing panics.

    #[test]
    fn test_record_authentication() {
        record_authentication("Bearer", "success");
        record_authentication("ApiKey", "missing_credentials");
    }

    #[test]
    fn test_record_authorization_denial() {
        record_authorization_denial("require_https", 403);
    }

    #[test]
    fn test_record_forwarded_header_error() {
        record_forwarded_header_error("forwarded");
    }

    #[test]
    fn test_record_pipeline_duration() {
        record_pipeline_duration(200, 0.004);
        record_route_duration("/values", 0.001);
        record_panic();
    }
}
