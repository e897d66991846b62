//! Per-route authorization as a tower layer.
//!
//! Applied with `route_layer` so it only runs for matched routes, after
//! authentication has populated the request context.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::PolicySet;
use crate::auth::AuthScheme;
use crate::context::RequestContext;
use crate::metrics;

/// Authorization layer evaluating a [`PolicySet`].
#[derive(Clone)]
pub struct AuthorizeLayer {
    policies: Arc<PolicySet>,
    challenge: Option<AuthScheme>,
}

impl AuthorizeLayer {
    pub fn new(policies: PolicySet) -> Self {
        Self {
            policies: Arc::new(policies),
            challenge: None,
        }
    }

    /// Add `WWW-Authenticate: <scheme>` to 401 denials.
    pub fn with_challenge(mut self, scheme: Option<AuthScheme>) -> Self {
        self.challenge = scheme;
        self
    }
}

impl<S> Layer<S> for AuthorizeLayer {
    type Service = AuthorizeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizeService {
            inner,
            policies: self.policies.clone(),
            challenge: self.challenge,
        }
    }
}

/// Authorization service wrapper.
#[derive(Clone)]
pub struct AuthorizeService<S> {
    inner: S,
    policies: Arc<PolicySet>,
    challenge: Option<AuthScheme>,
}

impl<S> Service<Request<Body>> for AuthorizeService<S>
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
        let decision = self
            .policies
            .evaluate(req.extensions().get::<RequestContext>());

        match decision {
            Ok(()) => {
                debug!(path = %req.uri().path(), "Authorization granted");
                // Take the service that was driven to readiness, leave a fresh clone behind.
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                Box::pin(async move { inner.call(req).await })
            }
            Err((kind, denial)) => {
                warn!(
                    path = %req.uri().path(),
                    policy = kind.as_str(),
                    status = denial.status().as_u16(),
                    reason = denial.reason(),
                    "Authorization denied"
                );
                metrics::record_authorization_denial(kind.as_str(), denial.status().as_u16());

                let denial = match self.challenge {
                    Some(scheme) => denial.with_challenge(scheme),
                    None => denial,
                };
                Box::pin(async move { Ok(denial.into_response()) })
            }
        }
    }
}
