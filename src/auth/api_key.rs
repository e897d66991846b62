//! Shared-secret API key authentication.
//!
//! Keys arrive via the `X-API-Key` header, the `api_key` query parameter or
//! `Authorization: ApiKey <key>`. Any non-empty key is accepted here; key
//! shape and read/write class are authorization concerns
//! (see [`crate::policy::Policy::RequireApiKey`]).

use axum::http::HeaderMap;
use axum::http::header::HeaderName;
use chrono::{SecondsFormat, Utc};

use super::credentials::{Credential, CredentialExtractor, Extraction};
use super::principal::{
    AUTHENTICATION_INSTANT_CLAIM, AuthScheme, CLIENT_ACCOUNT_CLAIM, Claim, Principal,
};
use super::{AuthError, Authentication, Authenticator};

/// Number of leading key characters that identify the client account.
pub const CLIENT_ACCOUNT_PREFIX_LEN: usize = 3;

pub struct ApiKeyValidator {
    extractor: CredentialExtractor,
}

impl ApiKeyValidator {
    pub fn new(header: HeaderName, query_key: impl Into<String>) -> Self {
        Self {
            extractor: CredentialExtractor::new(AuthScheme::ApiKey)
                .with_header(header)
                .with_query_key(query_key),
        }
    }

    /// Build the principal for a key: subject is the key itself, plus a
    /// client-account claim taken from the key prefix.
    pub fn validate(&self, credential: &Credential) -> Result<Principal, AuthError> {
        let key = credential.value();
        if key.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let account: String = key.chars().take(CLIENT_ACCOUNT_PREFIX_LEN).collect();
        let claims = vec![
            Claim::new(CLIENT_ACCOUNT_CLAIM, account),
            Claim::new(
                AUTHENTICATION_INSTANT_CLAIM,
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ];

        Principal::authenticated(key, AuthScheme::ApiKey, claims).ok_or(AuthError::InvalidCredentials)
    }
}

impl Authenticator for ApiKeyValidator {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::ApiKey
    }

    fn authenticate(&self, headers: &HeaderMap, query: Option<&str>) -> Authentication {
        let credential = match self.extractor.extract(headers, query) {
            Extraction::NotPresent => return Authentication::NotApplicable,
            Extraction::Empty => {
                return Authentication::Failed {
                    scheme: AuthScheme::ApiKey,
                    error: AuthError::MissingCredentials,
                };
            }
            Extraction::Present(credential) => credential,
        };

        match self.validate(&credential) {
            Ok(principal) => Authentication::Authenticated {
                principal,
                credential,
            },
            Err(error) => Authentication::Failed {
                scheme: AuthScheme::ApiKey,
                error,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::credentials::CredentialChannel;
    use axum::http::HeaderValue;

    fn validator() -> ApiKeyValidator {
        ApiKeyValidator::new(HeaderName::from_static("x-api-key"), "api_key")
    }

    #[test]
    fn test_validate_builds_account_claim() {
        let credential = Credential::new("ACME-77", CredentialChannel::Header, AuthScheme::ApiKey);
        let principal = validator().validate(&credential).unwrap();

        assert_eq!(principal.subject(), "ACME-77");
        assert_eq!(principal.scheme(), AuthScheme::ApiKey);
        assert_eq!(principal.find_first(CLIENT_ACCOUNT_CLAIM), Some("ACM"));
        assert!(principal.has_claim(AUTHENTICATION_INSTANT_CLAIM));
    }

    #[test]
    fn test_short_key_uses_whole_key_as_account() {
        let credential = Credential::new("R1", CredentialChannel::Query, AuthScheme::ApiKey);
        let principal = validator().validate(&credential).unwrap();
        assert_eq!(principal.find_first(CLIENT_ACCOUNT_CLAIM), Some("R1"));
    }

    #[test]
    fn test_any_non_empty_key_is_accepted() {
        // Shape rules (length 6, R/W prefix) are enforced by authorization.
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("not-a-valid-shape"));

        assert!(matches!(
            validator().authenticate(&headers, None),
            Authentication::Authenticated { .. }
        ));
    }

    #[test]
    fn test_authorization_scheme_without_key_fails() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("ApiKey "));

        assert!(matches!(
            validator().authenticate(&headers, None),
            Authentication::Failed {
                scheme: AuthScheme::ApiKey,
                error: AuthError::MissingCredentials,
            }
        ));
    }

    #[test]
    fn test_no_key_is_not_applicable() {
        assert!(matches!(
            validator().authenticate(&HeaderMap::new(), None),
            Authentication::NotApplicable
        ));
    }
}
