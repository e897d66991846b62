//! Per-request pipeline state.
//!
//! Every stage reads and writes one [`RequestContext`] stored in the request
//! extensions. It is created at pipeline entry by the timer layer and dropped
//! with the request; nothing in it is shared between requests.
//!
//! Handlers get at it through extractors:
//!
//! ```rust,ignore
//! async fn a(Extension(ctx): Extension<RequestContext>) { /* whole context */ }
//! async fn b(Authenticated(principal): Authenticated) { /* 401 if absent */ }
//! async fn c(ClientBaseUrl(base): ClientBaseUrl) { /* client-facing base URL */ }
//! async fn d(ClientOrigin(origin): ClientOrigin) { /* origin.url_for("/values/1") */ }
//! ```

use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::Request;
use axum::http::request::Parts;
use url::Url;

use crate::auth::{Credential, Principal};
use crate::error::AppError;
use crate::middleware::forwarded::ForwardingInfo;
use crate::policy::Denial;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// The credential that authenticated the request.
    pub credential: Option<Credential>,
    pub forwarding: Option<ForwardingInfo>,
    pub principal: Option<Principal>,
    pub started_at: Option<Instant>,
}

impl RequestContext {
    /// A fresh context for a request that entered the pipeline at `started_at`.
    pub fn starting_at(started_at: Instant) -> Self {
        Self {
            started_at: Some(started_at),
            ..Self::default()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal
            .as_ref()
            .is_some_and(Principal::is_authenticated)
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.forwarding.as_ref().map(ForwardingInfo::base_url)
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }
}

/// Access to the [`RequestContext`] of a request.
pub trait RequestContextExt {
    fn context(&self) -> Option<&RequestContext>;

    /// The context, created empty if no stage has created it yet.
    fn context_mut(&mut self) -> &mut RequestContext;
}

impl<B> RequestContextExt for Request<B> {
    fn context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }

    fn context_mut(&mut self) -> &mut RequestContext {
        self.extensions_mut()
            .get_or_insert_default::<RequestContext>()
    }
}

/// The authenticated principal. Rejects with 401 when the request carries none.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = Denial;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.principal.clone())
            .filter(Principal::is_authenticated)
            .map(Self)
            .ok_or_else(Denial::unauthorized)
    }
}

/// The client-facing origin, for building links that survive the proxy.
///
/// Rejects with 500 when the forwarding normalizer did not run.
#[derive(Debug, Clone)]
pub struct ClientOrigin(pub ForwardingInfo);

impl<S> FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.forwarding.clone())
            .map(Self)
            .ok_or_else(|| AppError::Internal("client origin was not resolved".to_string()))
    }
}

/// The client-facing base URL (`scheme://host[:port]/`).
///
/// Only available on routes behind the forwarding normalizer; anywhere else
/// it is a wiring bug and rejects with 500.
#[derive(Debug, Clone)]
pub struct ClientBaseUrl(pub Url);

impl<S> FromRequestParts<S> for ClientBaseUrl
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(RequestContext::base_url)
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::Internal("client origin was not resolved".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{AuthScheme, Claim};
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn principal() -> Principal {
        Principal::authenticated(
            "R12345",
            AuthScheme::ApiKey,
            vec![Claim::new("urn:ClientAccount", "R12")],
        )
        .unwrap()
    }

    #[test]
    fn test_context_mut_creates_once() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert!(req.context().is_none());

        req.context_mut().principal = Some(principal());
        req.context_mut().started_at = Some(Instant::now());

        let ctx = req.context().unwrap();
        assert!(ctx.is_authenticated());
        assert!(ctx.elapsed().is_some());
    }

    #[test]
    fn test_anonymous_principal_is_not_authenticated() {
        let ctx = RequestContext {
            principal: Some(Principal::anonymous(AuthScheme::Bearer)),
            ..RequestContext::default()
        };
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn test_authenticated_extractor_rejects_without_principal() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let rejection = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authenticated_extractor_returns_principal() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(RequestContext {
            principal: Some(principal()),
            ..RequestContext::default()
        });

        let Authenticated(p) = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(p.subject(), "R12345");
    }

    #[tokio::test]
    async fn test_client_origin_builds_links() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        headers.insert("x-forwarded-host", "api.example.com".parse().unwrap());
        let info = crate::middleware::resolve_forwarding(
            &axum::http::Uri::from_static("/"),
            &headers,
            "0.0.0.0",
            3000,
        )
        .unwrap();

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(RequestContext {
            forwarding: Some(info),
            ..RequestContext::default()
        });

        let ClientOrigin(origin) = ClientOrigin::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(
            origin.url_for("/values/1").unwrap().as_str(),
            "https://api.example.com/values/1"
        );
    }

    #[tokio::test]
    async fn test_client_base_url_requires_forwarding() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let rejection = ClientBaseUrl::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(
            rejection.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
