//! Last-resort handler for panics escaping a stage or handler.
//!
//! Installed with `tower_http::catch_panic::CatchPanicLayer::custom`. The panic
//! payload is logged server-side; the client only ever sees a generic 500.

use std::any::Any;

use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::error::AppError;
use crate::metrics;

pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    error!(panic = %detail, "Unhandled panic while processing request");
    metrics::record_panic();

    AppError::Internal(detail.to_string()).into_response()
}
