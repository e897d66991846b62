//! Application routing configuration with the pipeline stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Catch Panic    │ ← generic 500 for any panic below
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Pipeline Timer  │ ← creates RequestContext, adds X-API-Timer
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Forwarded     │ ← 400 on malformed proxy headers
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Authentication  │ ← 401 if a presented credential is rejected
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Authorization   │ ← per route: 401 / 403 from its PolicySet
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Route stages   │ ← per route: named timers, Cache-Control
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health`, `/ready` - monitoring, no policy
//! - `/values` - claim and API-key gated resource
//! - `/whoami`, `/secure/whoami` - identity, the latter HTTPS-only
//! - `/blobs/{data}`, `/files/{*path}` - custom extractors

use std::time::Duration;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, delete, get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthScheme;
use crate::handlers;
use crate::handlers::values::CUSTOM_CLAIM;
use crate::middleware::{
    CacheControl, CacheControlLayer, PipelineTimerLayer, RouteTimerLayer, authenticate,
    handle_panic, normalize_forwarding,
};
use crate::policy::{AuthorizeLayer, KeyClass, Policy, PolicySet};
use crate::state::AppState;

/// Client cache lifetime of `GET /values`.
const VALUES_MAX_AGE: Duration = Duration::from_secs(10);

/// Build the application router with all routes and the pipeline configured.
pub fn build_router(state: AppState) -> Router {
    let authorize = Authorize::new(&state);

    // =========================================================================
    // Routes and their policies
    // =========================================================================
    let router = Router::new()
        // Health and status endpoints (no policy)
        .route(
            "/health",
            get(handlers::health_check).route_layer(CacheControlLayer::new(CacheControl::NoStore)),
        )
        .route("/ready", get(handlers::readiness_check))
        // Values
        .route(
            "/values",
            authorize
                .guard(
                    get(handlers::list_values)
                        .route_layer(CacheControlLayer::new(CacheControl::Private(
                            VALUES_MAX_AGE,
                        )))
                        .route_layer(RouteTimerLayer::named("list_values"))
                        .route_layer(RouteTimerLayer::new()),
                    PolicySet::new().with(Policy::require_claims(CUSTOM_CLAIM, true)),
                )
                .merge(authorize.guard(
                    post(handlers::create_value),
                    PolicySet::new().with(Policy::RequireApiKey(Some(KeyClass::Write))),
                )),
        )
        .route(
            "/values/{id}",
            authorize
                .guard(
                    get(handlers::get_value).route_layer(RouteTimerLayer::new()),
                    PolicySet::new().with(Policy::RequireApiKey(Some(KeyClass::Read))),
                )
                .merge(authorize.guard(
                    delete(handlers::delete_value),
                    PolicySet::new().with(Policy::RequireApiKey(Some(KeyClass::Write))),
                )),
        )
        // Identity
        .route(
            "/whoami",
            authorize.guard(
                get(handlers::whoami).route_layer(CacheControlLayer::new(CacheControl::NoStore)),
                PolicySet::new().with(Policy::require_claims("", false)),
            ),
        )
        .route(
            "/secure/whoami",
            authorize.guard(
                get(handlers::whoami).route_layer(CacheControlLayer::new(CacheControl::NoStore)),
                PolicySet::new()
                    .with(Policy::RequireHttps)
                    .with(Policy::require_claims("", false)),
            ),
        )
        // Custom extractors
        .route("/blobs/{data}", get(handlers::decode_blob))
        .route("/files/{*path}", get(handlers::split_path));

    // =========================================================================
    // Apply Pipeline Stack (order matters - the last layer added runs first)
    // =========================================================================

    // 1. Authentication
    let router = router.layer(from_fn_with_state(state.clone(), authenticate));

    // 2. Forwarding header normalization
    let router = router.layer(from_fn_with_state(state.clone(), normalize_forwarding));

    // 3. Pipeline timer (creates the request context)
    let router = router.layer(PipelineTimerLayer::new());

    // 4. Tracing
    let router = router.layer(TraceLayer::new_for_http());

    // 5. Panic handler, outermost
    let router = router.layer(CatchPanicLayer::custom(handle_panic));

    info!(
        schemes = ?state.authenticators.schemes(),
        send_challenge = state.config.auth_send_challenge,
        "Pipeline configured"
    );

    router.with_state(state)
}

/// Builds per-route authorization layers sharing the router's challenge setting.
struct Authorize {
    challenge: Option<AuthScheme>,
}

impl Authorize {
    fn new(state: &AppState) -> Self {
        let challenge = if state.config.auth_send_challenge {
            state.authenticators.schemes().first().copied()
        } else {
            None
        };
        Self { challenge }
    }

    fn guard(
        &self,
        method_router: MethodRouter<AppState>,
        policies: PolicySet,
    ) -> MethodRouter<AppState> {
        method_router.route_layer(AuthorizeLayer::new(policies).with_challenge(self.challenge))
    }
}
