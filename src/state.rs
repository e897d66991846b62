//! Shared application state for Axum handlers and pipeline stages.
//!
//! Everything here is built once at startup and read-only afterwards:
//! configuration and the authenticator chain (with its decoding keys). Request
//! state never lives here; it goes in the per-request
//! [`RequestContext`](crate::context::RequestContext).

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthenticatorChain;
use crate::config::Config;
use crate::error::AppResult;

/// Shared application state.
///
/// Cloned for each request; all internal data is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Authenticators in configured precedence order
    pub authenticators: Arc<AuthenticatorChain>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration, loading key material for the
    /// authenticators.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if an authenticator cannot be built
    /// (unreadable or invalid public key, no usable scheme).
    pub fn new(config: Config) -> AppResult<Self> {
        let authenticators = AuthenticatorChain::from_config(&config)?;
        Ok(Self::with_authenticators(config, authenticators))
    }

    /// Build state around an already-assembled chain.
    pub fn with_authenticators(config: Config, authenticators: AuthenticatorChain) -> Self {
        Self {
            config: Arc::new(config),
            authenticators: Arc::new(authenticators),
            started_at: Instant::now(),
        }
    }

    /// Get application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::AuthScheme;
    use crate::config::{SigningKeySource, TokenSettings};

    #[test]
    fn test_new_builds_configured_chain() {
        let config = Config {
            token: TokenSettings {
                signing_key: Some(SigningKeySource::Secret("s3cret".to_string())),
                ..TokenSettings::default()
            },
            ..Config::default()
        };

        let state = AppState::new(config).unwrap();
        assert_eq!(
            state.authenticators.schemes(),
            vec![AuthScheme::Bearer, AuthScheme::ApiKey]
        );
        assert!(state.uptime_seconds() < 5);
    }

    #[test]
    fn test_new_fails_on_missing_public_key() {
        let config = Config {
            token: TokenSettings {
                signing_key: Some(SigningKeySource::RsaPublicKeyPem(
                    "/nonexistent/key.pem".into(),
                )),
                ..TokenSettings::default()
            },
            ..Config::default()
        };

        assert!(AppState::new(config).is_err());
    }
}
