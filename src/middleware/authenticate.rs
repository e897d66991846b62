//! Authentication stage: run the authenticator chain and record the outcome.
//!
//! | Chain result     | Effect                                              |
//! |------------------|-----------------------------------------------------|
//! | `Authenticated`  | principal and credential stored in the context      |
//! | `NotApplicable`  | request continues anonymously; policies decide      |
//! | `Failed`         | 401 with a short reason, handler never runs         |
//!
//! Anonymous requests are not rejected here: routes without policies (e.g.
//! `/health`) stay reachable, and `RequireClaims` turns the missing identity
//! into a 401 where one is needed.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::Authentication;
use crate::context::RequestContextExt;
use crate::policy::Denial;
use crate::state::AppState;

pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let outcome = state
        .authenticators
        .authenticate(req.headers(), req.uri().query());

    match outcome {
        Authentication::Authenticated {
            principal,
            credential,
        } => {
            let ctx = req.context_mut();
            ctx.principal = Some(principal);
            ctx.credential = Some(credential);
            next.run(req).await
        }
        Authentication::NotApplicable => next.run(req).await,
        Authentication::Failed { scheme, error } => {
            let denial = Denial::authentication_failed(error);
            let denial = if state.config.auth_send_challenge {
                denial.with_challenge(scheme)
            } else {
                denial
            };
            denial.into_response()
        }
    }
}
