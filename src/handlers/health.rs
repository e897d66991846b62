//! Health and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Service status and enabled authenticators
//! - `GET /ready` - Kubernetes-compatible readiness probe
//!
//! Neither carries a policy, so both answer without credentials.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "auth_schemes": ["Bearer", "ApiKey"],
///   "uptime_seconds": 42,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_schemes: state.authenticators.schemes(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for Kubernetes probes.
///
/// The authenticator chain is built before the listener binds, so a running
/// server is always ready.
#[instrument]
pub async fn readiness_check() -> StatusCode {
    StatusCode::OK
}
