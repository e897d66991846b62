//! Request and response bodies for the demo API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthScheme, Claim, Principal};

/// Maximum length of a stored value.
pub const MAX_VALUE_LENGTH: usize = 1024;

/// Body of `POST /values`.
#[derive(Debug, Deserialize)]
pub struct CreateValueRequest {
    pub value: String,
}

impl CreateValueRequest {
    /// Reject empty or oversized values.
    pub fn validate(&self) -> Result<(), String> {
        if self.value.trim().is_empty() {
            return Err("value must not be empty".to_string());
        }
        if self.value.len() > MAX_VALUE_LENGTH {
            return Err(format!(
                "value exceeds maximum length of {MAX_VALUE_LENGTH} bytes"
            ));
        }
        Ok(())
    }
}

/// A single value with its client-facing link.
#[derive(Debug, Serialize)]
pub struct ValueResponse {
    pub id: u32,
    pub value: String,
    /// Absolute URL of this resource as seen by the client
    pub href: String,
}

/// The authenticated identity, as returned by `GET /whoami`.
#[derive(Debug, Serialize)]
pub struct PrincipalResponse {
    pub subject: String,
    pub scheme: AuthScheme,
    pub claims: Vec<Claim>,
    /// Client-facing base URL the request arrived on
    pub base_url: String,
}

impl PrincipalResponse {
    pub fn new(principal: &Principal, base_url: String) -> Self {
        Self {
            subject: principal.subject().to_string(),
            scheme: principal.scheme(),
            claims: principal.claims().to_vec(),
            base_url,
        }
    }
}

/// Decoded `GET /blobs/{data}` segment.
#[derive(Debug, Serialize)]
pub struct BlobResponse {
    pub length: usize,
    /// Lowercase hex of the decoded bytes
    pub hex: String,
}

/// Split `GET /files/{*path}` parameter.
#[derive(Debug, Serialize)]
pub struct PathSegmentsResponse {
    pub segments: Vec<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Authenticators enabled, in precedence order
    pub auth_schemes: Vec<AuthScheme>,
    pub uptime_seconds: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_value_validation() {
        let ok = CreateValueRequest {
            value: "hello".to_string(),
        };
        assert!(ok.validate().is_ok());

        let blank = CreateValueRequest {
            value: "   ".to_string(),
        };
        assert!(blank.validate().is_err());

        let long = CreateValueRequest {
            value: "x".repeat(MAX_VALUE_LENGTH + 1),
        };
        assert!(long.validate().unwrap_err().contains("maximum length"));
    }

    #[test]
    fn test_principal_response_serialization() {
        let principal = Principal::authenticated(
            "R12345",
            AuthScheme::ApiKey,
            vec![Claim::new("urn:ClientAccount", "R12")],
        )
        .unwrap();

        let json = serde_json::to_value(PrincipalResponse::new(
            &principal,
            "https://api.example.com/".to_string(),
        ))
        .unwrap();

        assert_eq!(json["subject"], "R12345");
        assert_eq!(json["scheme"], "ApiKey");
        assert_eq!(json["claims"][0]["type"], "urn:ClientAccount");
        assert_eq!(json["claims"][0]["value"], "R12");
    }
}
