//! Credential validation: turn a request's credential into a [`Principal`].
//!
//! Each [`Authenticator`] handles one scheme. The [`AuthenticatorChain`] runs
//! them in configured order and the first one that *applies* decides:
//!
//! - `Authenticated` sets the principal and stops the chain
//! - `Failed` ends the request with 401; later authenticators are not consulted
//! - `NotApplicable` (no credential for this scheme, or a credential in a
//!   format this scheme does not understand) moves on to the next one
//!
//! With the default order (`Bearer`, then `ApiKey`) a valid token wins over a
//! valid API key sent on the same request.

pub mod api_key;
pub mod credentials;
pub mod principal;
pub mod token;

use axum::http::HeaderMap;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use api_key::ApiKeyValidator;
pub use credentials::{Credential, CredentialChannel, CredentialExtractor, Extraction};
pub use principal::{AuthScheme, Claim, Principal};
pub use token::{LifetimeError, TokenError, TokenValidator};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics;

/// A credential that applied to a scheme but did not authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error(transparent)]
    Token(TokenError),

    #[error("invalid credentials")]
    InvalidCredentials,
}

impl AuthError {
    /// Short reason returned to the caller. Token failures share one phrase
    /// regardless of which check failed.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "Missing credentials",
            AuthError::Token(_) => "Invalid security token",
            AuthError::InvalidCredentials => "Invalid credentials",
        }
    }

    /// Classification used for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::Token(TokenError::Lifetime(_)) => "lifetime_error",
            AuthError::Token(_) => "invalid_token",
            AuthError::InvalidCredentials => "invalid_credentials",
        }
    }
}

/// Outcome of running one authenticator (or the whole chain).
#[derive(Debug, Clone)]
pub enum Authentication {
    NotApplicable,
    Authenticated {
        principal: Principal,
        credential: Credential,
    },
    Failed {
        scheme: AuthScheme,
        error: AuthError,
    },
}

/// One authentication scheme.
pub trait Authenticator: Send + Sync {
    fn scheme(&self) -> AuthScheme;

    /// Inspect headers and query string. Never fails past its own boundary:
    /// every expected failure is an [`Authentication`] value.
    fn authenticate(&self, headers: &HeaderMap, query: Option<&str>) -> Authentication;
}

/// Ordered set of authenticators built once at startup.
#[derive(Default)]
pub struct AuthenticatorChain {
    authenticators: Vec<Box<dyn Authenticator>>,
}

impl AuthenticatorChain {
    pub fn new(authenticators: Vec<Box<dyn Authenticator>>) -> Self {
        Self { authenticators }
    }

    /// Build the chain in `config.auth_schemes` order.
    ///
    /// `Bearer` is skipped with a warning when no signing key is configured,
    /// so a development setup without key material still serves API keys.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if key material is configured but
    /// cannot be loaded.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let mut authenticators: Vec<Box<dyn Authenticator>> = Vec::new();

        for scheme in &config.auth_schemes {
            match scheme {
                AuthScheme::Bearer if !config.bearer_enabled() => {
                    warn!("Bearer authentication disabled (no JWT_SECRET or JWT_PUBLIC_KEY_PATH)");
                }
                AuthScheme::Bearer => {
                    authenticators.push(Box::new(TokenValidator::from_settings(&config.token)?));
                    info!(
                        issuer = %config.token.issuer,
                        audience = %config.token.audience,
                        "Bearer authentication enabled"
                    );
                }
                AuthScheme::ApiKey => {
                    let header = config.api_key_header_name()?;
                    authenticators.push(Box::new(ApiKeyValidator::new(
                        header,
                        config.api_key_query.clone(),
                    )));
                    info!(
                        header = %config.api_key_header,
                        query = %config.api_key_query,
                        "API key authentication enabled"
                    );
                }
            }
        }

        if authenticators.is_empty() {
            return Err(AppError::ConfigError(
                "No authentication scheme could be enabled".to_string(),
            ));
        }

        Ok(Self::new(authenticators))
    }

    pub fn schemes(&self) -> Vec<AuthScheme> {
        self.authenticators.iter().map(|a| a.scheme()).collect()
    }

    pub fn authenticate(&self, headers: &HeaderMap, query: Option<&str>) -> Authentication {
        for authenticator in &self.authenticators {
            match authenticator.authenticate(headers, query) {
                Authentication::NotApplicable => continue,
                Authentication::Authenticated {
                    principal,
                    credential,
                } => {
                    debug!(
                        scheme = %principal.scheme(),
                        channel = ?credential.channel(),
                        "Authentication successful"
                    );
                    metrics::record_authentication(principal.scheme().as_str(), "success");
                    return Authentication::Authenticated {
                        principal,
                        credential,
                    };
                }
                Authentication::Failed { scheme, error } => {
                    warn!(
                        scheme = %scheme,
                        outcome = error.outcome(),
                        "Authentication failed"
                    );
                    metrics::record_authentication(scheme.as_str(), error.outcome());
                    return Authentication::Failed { scheme, error };
                }
            }
        }

        Authentication::NotApplicable
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::header::HeaderName;

    struct Fixed(AuthScheme, fn() -> Authentication);

    impl Authenticator for Fixed {
        fn scheme(&self) -> AuthScheme {
            self.0
        }

        fn authenticate(&self, _: &HeaderMap, _: Option<&str>) -> Authentication {
            (self.1)()
        }
    }

    fn api_key() -> Box<dyn Authenticator> {
        Box::new(ApiKeyValidator::new(
            HeaderName::from_static("x-api-key"),
            "api_key",
        ))
    }

    #[test]
    fn test_empty_chain_is_not_applicable() {
        let chain = AuthenticatorChain::default();
        assert!(matches!(
            chain.authenticate(&HeaderMap::new(), None),
            Authentication::NotApplicable
        ));
    }

    #[test]
    fn test_failure_stops_the_chain() {
        let failing = Fixed(AuthScheme::Bearer, || Authentication::Failed {
            scheme: AuthScheme::Bearer,
            error: AuthError::Token(TokenError::Invalid),
        });
        let chain = AuthenticatorChain::new(vec![Box::new(failing), api_key()]);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("R12345"));

        assert!(matches!(
            chain.authenticate(&headers, None),
            Authentication::Failed {
                scheme: AuthScheme::Bearer,
                ..
            }
        ));
    }

    #[test]
    fn test_not_applicable_falls_through() {
        let skipping = Fixed(AuthScheme::Bearer, || Authentication::NotApplicable);
        let chain = AuthenticatorChain::new(vec![Box::new(skipping), api_key()]);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("R12345"));

        let Authentication::Authenticated { principal, .. } = chain.authenticate(&headers, None)
        else {
            panic!("expected the API key authenticator to apply");
        };
        assert_eq!(principal.scheme(), AuthScheme::ApiKey);
    }

    #[test]
    fn test_reason_hides_token_failure_class() {
        let lifetime = AuthError::Token(TokenError::Lifetime(LifetimeError::Expired));
        let invalid = AuthError::Token(TokenError::Invalid);

        assert_eq!(lifetime.reason(), invalid.reason());
        assert_ne!(lifetime.outcome(), invalid.outcome());
    }

    #[test]
    fn test_from_config_skips_bearer_without_key() {
        let chain = AuthenticatorChain::from_config(&Config::default()).unwrap();
        assert_eq!(chain.schemes(), vec![AuthScheme::ApiKey]);
    }
}
