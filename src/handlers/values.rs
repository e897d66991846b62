//! The `/values` resource.
//!
//! | Route                 | Policy                                   |
//! |-----------------------|------------------------------------------|
//! | `GET /values`         | claim `MyCustomClaim`, missing listed    |
//! | `GET /values/{id}`    | API key, read class                      |
//! | `POST /values`        | API key, write class                     |
//! | `DELETE /values/{id}` | API key, write class (not implemented)   |
//!
//! Policies are attached in [`crate::routes`]; handlers here assume they passed.

use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::IntoResponse;
use tracing::{info, instrument};

use crate::context::{Authenticated, ClientOrigin};
use crate::middleware::ForwardingInfo;
use crate::error::{AppError, AppResult};
use crate::models::{CreateValueRequest, ValueResponse};

/// Claim type required by `GET /values`.
pub const CUSTOM_CLAIM: &str = "MyCustomClaim";

/// Id assigned to values created through `POST /values`.
const CREATED_VALUE_ID: u32 = 1;

/// `[subject, scheme]` of the caller.
#[instrument(skip_all)]
pub async fn list_values(Authenticated(principal): Authenticated) -> Json<Vec<String>> {
    Json(vec![
        principal.subject().to_string(),
        principal.scheme().to_string(),
    ])
}

#[instrument(skip(origin))]
pub async fn get_value(
    ClientOrigin(origin): ClientOrigin,
    Path(id): Path<u32>,
) -> AppResult<Json<ValueResponse>> {
    Ok(Json(ValueResponse {
        id,
        value: "value".to_string(),
        href: href(&origin, id)?,
    }))
}

/// Accepts a value and answers 201 with a client-facing `Location`.
#[instrument(skip_all)]
pub async fn create_value(
    ClientOrigin(origin): ClientOrigin,
    Json(request): Json<CreateValueRequest>,
) -> AppResult<impl IntoResponse> {
    request.validate().map_err(AppError::BadRequest)?;

    let href = href(&origin, CREATED_VALUE_ID)?;
    info!(location = %href, "Value accepted");

    Ok((
        StatusCode::CREATED,
        [(LOCATION, href.clone())],
        Json(ValueResponse {
            id: CREATED_VALUE_ID,
            value: request.value,
            href,
        }),
    ))
}

#[instrument]
pub async fn delete_value(Path(id): Path<u32>) -> AppResult<StatusCode> {
    Err(AppError::NotImplemented(format!("delete value {id}")))
}

fn href(origin: &ForwardingInfo, id: u32) -> AppResult<String> {
    origin
        .url_for(&format!("/values/{id}"))
        .map(String::from)
        .map_err(|e| AppError::Internal(format!("cannot build value URL: {e}")))
}
