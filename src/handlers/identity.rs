//! Identity endpoints.
//!
//! - `GET /whoami` - the caller's principal and client-facing base URL
//! - `GET /secure/whoami` - same, behind `RequireHttps`

use axum::Json;
use tracing::instrument;

use crate::context::{Authenticated, ClientBaseUrl};
use crate::models::PrincipalResponse;

#[instrument(skip_all, fields(subject = %principal.subject()))]
pub async fn whoami(
    Authenticated(principal): Authenticated,
    ClientBaseUrl(base_url): ClientBaseUrl,
) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::new(&principal, base_url.to_string()))
}
