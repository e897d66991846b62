//! Pipeline entry: context creation and total-time reporting.
//!
//! This is the outermost pipeline stage. It creates the [`RequestContext`]
//! every later stage writes into, and on the way out stamps the response with
//! the time spent in the pipeline and the handler:
//!
//! ```text
//! X-API-Timer: 3 msec
//! ```
//!
//! Denials and error responses are timed too, since they pass back through
//! this layer like any other response. Per-route timers
//! ([`RouteTimerLayer`](super::RouteTimerLayer)) add their own values to the
//! same header; the pipeline total is always the last one.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::debug;

use crate::context::RequestContext;
use crate::metrics;

/// Response header carrying the elapsed pipeline time.
pub static API_TIMER_HEADER: HeaderName = HeaderName::from_static("x-api-timer");

/// Timer layer for the Tower middleware stack.
#[derive(Clone, Default)]
pub struct PipelineTimerLayer;

impl PipelineTimerLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for PipelineTimerLayer {
    type Service = PipelineTimerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineTimerService { inner }
    }
}

/// Timer service wrapper.
#[derive(Clone)]
pub struct PipelineTimerService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for PipelineTimerService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let started_at = Instant::now();
        req.extensions_mut()
            .insert(RequestContext::starting_at(started_at));

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;

            let elapsed = started_at.elapsed();
            metrics::record_pipeline_duration(response.status().as_u16(), elapsed.as_secs_f64());
            debug!(
                status = response.status().as_u16(),
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "Request completed"
            );

            if let Ok(value) = HeaderValue::from_str(&format_elapsed(elapsed.as_millis())) {
                response
                    .headers_mut()
                    .append(API_TIMER_HEADER.clone(), value);
            }

            Ok(response)
        })
    }
}

pub(crate) fn format_elapsed(millis: u128) -> String {
    format!("{millis} msec")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tower::ServiceExt;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0 msec");
        assert_eq!(format_elapsed(1250), "1250 msec");
    }

    #[tokio::test]
    async fn test_timer_header_and_context() {
        let app = Router::new()
            .route(
                "/",
                get(|Extension(ctx): Extension<RequestContext>| async move {
                    assert!(ctx.started_at.is_some());
                    assert!(ctx.principal.is_none());
                    "ok"
                }),
            )
            .layer(PipelineTimerLayer::new());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let timer = response.headers()[&API_TIMER_HEADER].to_str().unwrap();
        assert!(timer.ends_with(" msec"), "unexpected timer header {timer}");
    }

    #[tokio::test]
    async fn test_not_found_is_timed() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(PipelineTimerLayer::new());
        let response = app
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(&API_TIMER_HEADER));
    }
}
