//! Named per-route timers.
//!
//! Several timers can wrap the same route; each one logs its elapsed time,
//! records it under its name and appends an `X-API-Timer` value. Unnamed
//! timers take the matched route path as their name.
//!
//! ```rust,ignore
//! get(handler)
//!     .route_layer(RouteTimerLayer::named("handler"))
//!     .route_layer(RouteTimerLayer::new())
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::header::HeaderValue;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::info;

use super::timer::{API_TIMER_HEADER, format_elapsed};
use crate::metrics;

#[derive(Debug, Clone, Default)]
pub struct RouteTimerLayer {
    name: Option<Arc<str>>,
}

impl RouteTimerLayer {
    /// A timer named after the matched route.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: Some(Arc::from(name)),
        }
    }
}

impl<S> Layer<S> for RouteTimerLayer {
    type Service = RouteTimerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteTimerService {
            inner,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteTimerService<S> {
    inner: S,
    name: Option<Arc<str>>,
}

impl<S> Service<Request<Body>> for RouteTimerService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let name = match (&self.name, req.extensions().get::<MatchedPath>()) {
            (Some(name), _) => name.to_string(),
            (None, Some(path)) => path.as_str().to_string(),
            (None, None) => "unmatched".to_string(),
        };
        let method = req.method().clone();
        let uri = req.uri().clone();
        let started_at = Instant::now();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;

            let elapsed = started_at.elapsed();
            info!(
                %method,
                %uri,
                timer = %name,
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "Route timer"
            );
            metrics::record_route_duration(&name, elapsed.as_secs_f64());

            if let Ok(value) = HeaderValue::from_str(&format_elapsed(elapsed.as_millis())) {
                response
                    .headers_mut()
                    .append(API_TIMER_HEADER.clone(), value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_each_timer_appends_a_value() {
        let app = Router::new().route(
            "/values",
            get(|| async { "ok" })
                .route_layer(RouteTimerLayer::named("inner"))
                .route_layer(RouteTimerLayer::new()),
        );

        let response = app
            .oneshot(Request::builder().uri("/values").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let timers: Vec<_> = response
            .headers()
            .get_all(&API_TIMER_HEADER)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(timers.len(), 2);
        assert!(timers.iter().all(|t| t.ends_with(" msec")), "{timers:?}");
    }

    #[tokio::test]
    async fn test_timer_does_not_touch_other_routes() {
        let app = Router::new()
            .route("/timed", get(|| async { "ok" }).route_layer(RouteTimerLayer::new()))
            .route("/plain", get(|| async { "ok" }));

        let response = app
            .oneshot(Request::builder().uri("/plain").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(!response.headers().contains_key(&API_TIMER_HEADER));
    }
}
