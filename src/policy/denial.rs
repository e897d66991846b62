use axum::Json;
use axum::http::header::{HeaderValue, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::{AuthError, AuthScheme};

/// A terminal 401/403 pipeline decision.
///
/// Carries only a short reason: never which check failed inside a token or
/// why a key was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    status: StatusCode,
    reason: &'static str,
    missing_claims: Option<Vec<String>>,
    challenge: Option<AuthScheme>,
}

#[derive(Serialize)]
struct DenialBody<'a> {
    error: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_claims: Option<&'a [String]>,
}

impl Denial {
    fn new(status: StatusCode, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            missing_claims: None,
            challenge: None,
        }
    }

    /// 401: no authenticated identity.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// 401: a credential was presented and rejected.
    pub fn authentication_failed(error: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error.reason())
    }

    /// 403: authenticated, but claims are missing. The list is only sent back
    /// when `include_missing` is set.
    pub fn lacking_claims(missing: Vec<String>, include_missing: bool) -> Self {
        Self {
            missing_claims: include_missing.then_some(missing),
            ..Self::new(StatusCode::FORBIDDEN, "Identity lacks required claims")
        }
    }

    pub fn invalid_api_key() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Invalid API key")
    }

    pub fn https_required() -> Self {
        Self::new(StatusCode::FORBIDDEN, "HTTPS Required")
    }

    /// Advertise `scheme` in `WWW-Authenticate`. Only applied to 401s.
    pub fn with_challenge(mut self, scheme: AuthScheme) -> Self {
        if self.status == StatusCode::UNAUTHORIZED {
            self.challenge = Some(scheme);
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason(&self) -> &'static str {
        self.reason
    }

    pub fn missing_claims(&self) -> Option<&[String]> {
        self.missing_claims.as_deref()
    }

    pub fn challenge(&self) -> Option<AuthScheme> {
        self.challenge
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let error = if self.status == StatusCode::UNAUTHORIZED {
            "unauthorized"
        } else {
            "forbidden"
        };

        let body = DenialBody {
            error,
            message: self.reason,
            missing_claims: self.missing_claims.as_deref(),
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(scheme) = self.challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(scheme.as_str()));
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{LifetimeError, TokenError};
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthorized_body() {
        let response = Denial::unauthorized().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let body = body_json(response).await;
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(body["message"], "Unauthorized");
        assert!(body.get("missing_claims").is_none());
    }

    #[tokio::test]
    async fn test_missing_claims_listed() {
        let response =
            Denial::lacking_claims(vec!["urn:MyCustomClaim".to_string()], true).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_json(response).await;
        assert_eq!(body["error"], "forbidden");
        assert_eq!(body["missing_claims"][0], "urn:MyCustomClaim");
    }

    #[tokio::test]
    async fn test_token_failures_look_the_same() {
        let expired = Denial::authentication_failed(AuthError::Token(TokenError::Lifetime(
            LifetimeError::Expired,
        )));
        let forged = Denial::authentication_failed(AuthError::Token(TokenError::Invalid));
        assert_eq!(expired, forged);

        let body = body_json(expired.into_response()).await;
        assert_eq!(body["message"], "Invalid security token");
    }

    #[test]
    fn test_challenge_header_on_401_only() {
        let response = Denial::unauthorized()
            .with_challenge(AuthScheme::Bearer)
            .into_response();
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

        let denial = Denial::https_required().with_challenge(AuthScheme::Bearer);
        assert_eq!(denial.challenge(), None);
    }
}
