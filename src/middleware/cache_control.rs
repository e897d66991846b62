//! Per-route client caching headers.
//!
//! Attached with `route_layer` inside the authorization layer, so only
//! responses produced by the handler are marked; denials are left alone.
//!
//! | Directive              | Headers set                                              |
//! |------------------------|----------------------------------------------------------|
//! | [`CacheControl::Public`]  | `Cache-Control: public, max-age=N`, `Date`, `Expires`  |
//! | [`CacheControl::Private`] | `Cache-Control: private, max-age=N`, `Date`, `Expires` |
//! | [`CacheControl::NoStore`] | `Cache-Control: no-store`, `Pragma: no-cache`, `Date`, `Expires` |
//!
//! `Expires` always equals `Date`. An existing `Date` header is kept.

use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, DATE, EXPIRES, HeaderValue, PRAGMA};
use axum::http::{Request, Response};
use chrono::Utc;
use tower::{Layer, Service};

/// Default `max-age` for [`CacheControl::private`].
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60);

/// Client caching directive for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheControl {
    /// Cacheable by shared caches, even for authenticated requests.
    Public(Duration),
    /// Browser-only caching, for per-user data.
    Private(Duration),
    /// No caching anywhere.
    NoStore,
}

impl CacheControl {
    /// Private caching for [`DEFAULT_MAX_AGE`].
    pub fn private() -> Self {
        Self::Private(DEFAULT_MAX_AGE)
    }

    fn header_value(&self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={}", max_age.as_secs()),
            Self::Private(max_age) => format!("private, max-age={}", max_age.as_secs()),
            Self::NoStore => "no-store".to_string(),
        }
    }
}

/// HTTP-date (RFC 7231 IMF-fixdate) for the current time.
fn http_date_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn apply(directive: CacheControl, response: &mut Response<Body>) {
    let headers = response.headers_mut();

    if let Ok(value) = HeaderValue::from_str(&directive.header_value()) {
        headers.insert(CACHE_CONTROL, value);
    }
    if directive == CacheControl::NoStore {
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    if !headers.contains_key(DATE)
        && let Ok(now) = HeaderValue::from_str(&http_date_now())
    {
        headers.insert(DATE, now);
    }
    if let Some(date) = headers.get(DATE).cloned() {
        headers.insert(EXPIRES, date);
    }
}

/// Layer marking handler responses with a [`CacheControl`] directive.
#[derive(Debug, Clone, Copy)]
pub struct CacheControlLayer {
    directive: CacheControl,
}

impl CacheControlLayer {
    pub fn new(directive: CacheControl) -> Self {
        Self { directive }
    }
}

impl<S> Layer<S> for CacheControlLayer {
    type Service = CacheControlService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheControlService {
            inner,
            directive: self.directive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheControlService<S> {
    inner: S,
    directive: CacheControl,
}

impl<S> Service<Request<Body>> for CacheControlService<S>
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
        let directive = self.directive;
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            apply(directive, &mut response);
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

    async fn call(directive: CacheControl) -> Response<Body> {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(CacheControlLayer::new(directive))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_private_max_age() {
        let response = call(CacheControl::Private(Duration::from_secs(10))).await;
        let headers = response.headers();

        assert_eq!(headers[CACHE_CONTROL], "private, max-age=10");
        assert!(headers.get(PRAGMA).is_none());
        assert_eq!(headers[EXPIRES], headers[DATE]);
    }

    #[tokio::test]
    async fn test_public_max_age() {
        let response = call(CacheControl::Public(Duration::from_secs(300))).await;
        assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=300");
    }

    #[tokio::test]
    async fn test_no_store() {
        let response = call(CacheControl::NoStore).await;
        let headers = response.headers();

        assert_eq!(headers[CACHE_CONTROL], "no-store");
        assert_eq!(headers[PRAGMA], "no-cache");
        assert_eq!(headers[EXPIRES], headers[DATE]);
    }

    #[tokio::test]
    async fn test_existing_date_is_kept() {
        let response = Router::new()
            .route(
                "/",
                get(|| async { ([(DATE, "Sun, 06 Nov 1994 08:49:37 GMT")], "ok") }),
            )
            .layer(CacheControlLayer::new(CacheControl::private()))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.headers()[CACHE_CONTROL], "private, max-age=60");
        assert_eq!(response.headers()[EXPIRES], "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_http_date_shape() {
        let date = http_date_now();
        assert!(date.ends_with(" GMT"), "{date}");
        assert_eq!(date.len(), "Sun, 06 Nov 1994 08:49:37 GMT".len());
    }
}
