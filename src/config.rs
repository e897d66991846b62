//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//! Everything here is read once at startup and never mutated afterwards.
//!
//! # Authentication Configuration
//!
//! - `AUTH_SCHEMES`: Comma-separated authenticator order (default: `Bearer,ApiKey`)
//! - `JWT_PUBLIC_KEY_PATH`: RS256 public key (PEM) used to verify bearer tokens
//! - `JWT_SECRET`: HS256 shared secret, alternative to a public key
//! - `JWT_ISSUER` / `JWT_AUDIENCE`: the single accepted issuer and audience
//! - `JWT_CLOCK_SKEW_SECS`: tolerance applied to both `nbf` and `exp` (default: 5)
//! - `API_KEY_HEADER` / `API_KEY_QUERY`: where API keys are looked for

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::header::HeaderName;

use crate::auth::AuthScheme;
use crate::error::{AppError, AppResult};

/// Key material for bearer token signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningKeySource {
    /// HS256 shared secret.
    Secret(String),
    /// RS256 public key in PEM form, read once at startup.
    RsaPublicKeyPem(PathBuf),
}

/// Bearer token validation settings.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// The only accepted `iss` value
    pub issuer: String,

    /// The only accepted `aud` value
    pub audience: String,

    /// Leeway applied to both ends of the token lifetime window
    pub clock_skew: Duration,

    /// Claim holding the principal's subject (default: "sub")
    pub subject_claim: String,

    /// Signature verification key (None = bearer authentication disabled)
    pub signing_key: Option<SigningKeySource>,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: "http://my.tokenissuer.com".to_string(),
            audience: "https://my.company.com".to_string(),
            clock_skew: Duration::from_secs(5),
            subject_claim: "sub".to_string(),
            signing_key: None,
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Authenticators in precedence order; the first that applies decides.
    pub auth_schemes: Vec<AuthScheme>,

    /// Bearer token settings
    pub token: TokenSettings,

    /// Dedicated API key header (default: "x-api-key")
    pub api_key_header: String,

    /// API key query parameter, matched case-insensitively (default: "api_key")
    pub api_key_query: String,

    /// Add `WWW-Authenticate: <scheme>` to 401 responses (default: false)
    pub auth_send_challenge: bool,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if any required configuration is invalid
    /// (e.g., non-numeric PORT value, unknown auth scheme).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = TokenSettings::default();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            // Authentication
            auth_schemes: Self::parse_auth_schemes()?,
            token: TokenSettings {
                issuer: env::var("JWT_ISSUER").unwrap_or(defaults.issuer),
                audience: env::var("JWT_AUDIENCE").unwrap_or(defaults.audience),
                clock_skew: Duration::from_secs(Self::parse_env("JWT_CLOCK_SKEW_SECS", 5)?),
                subject_claim: env::var("JWT_SUBJECT_CLAIM").unwrap_or(defaults.subject_claim),
                signing_key: Self::parse_signing_key()?,
            },
            api_key_header: env::var("API_KEY_HEADER").unwrap_or_else(|_| "x-api-key".to_string()),
            api_key_query: env::var("API_KEY_QUERY").unwrap_or_else(|_| "api_key".to_string()),
            auth_send_challenge: Self::parse_env("AUTH_SEND_CHALLENGE", false)?,

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.auth_schemes.is_empty() {
            return Err(AppError::ConfigError(
                "AUTH_SCHEMES must name at least one scheme".to_string(),
            ));
        }

        if self.token.issuer.trim().is_empty() {
            return Err(AppError::ConfigError(
                "JWT_ISSUER must not be empty".to_string(),
            ));
        }

        if self.token.audience.trim().is_empty() {
            return Err(AppError::ConfigError(
                "JWT_AUDIENCE must not be empty".to_string(),
            ));
        }

        if self.token.subject_claim.trim().is_empty() {
            return Err(AppError::ConfigError(
                "JWT_SUBJECT_CLAIM must not be empty".to_string(),
            ));
        }

        if self.api_key_query.trim().is_empty() {
            return Err(AppError::ConfigError(
                "API_KEY_QUERY must not be empty".to_string(),
            ));
        }

        self.api_key_header_name()?;

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The API key header as a typed header name.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `API_KEY_HEADER` is not a valid header name.
    pub fn api_key_header_name(&self) -> AppResult<HeaderName> {
        HeaderName::from_bytes(self.api_key_header.as_bytes()).map_err(|e| {
            AppError::ConfigError(format!(
                "Invalid API_KEY_HEADER '{}': {e}",
                self.api_key_header
            ))
        })
    }

    /// Check if bearer tokens can be verified.
    pub fn bearer_enabled(&self) -> bool {
        self.auth_schemes.contains(&AuthScheme::Bearer) && self.token.signing_key.is_some()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        if self.metrics_enabled() {
            Some(std::net::SocketAddr::from((
                [0, 0, 0, 0],
                self.metrics_port,
            )))
        } else {
            None
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse the authenticator order from `AUTH_SCHEMES`.
    ///
    /// Default: "Bearer,ApiKey". Duplicates are dropped, keeping the first position.
    fn parse_auth_schemes() -> AppResult<Vec<AuthScheme>> {
        let raw = env::var("AUTH_SCHEMES").unwrap_or_else(|_| "Bearer,ApiKey".to_string());
        parse_scheme_list(&raw)
    }

    /// Resolve signing key material. A public key path and a secret are
    /// mutually exclusive.
    fn parse_signing_key() -> AppResult<Option<SigningKeySource>> {
        let public_key = env::var("JWT_PUBLIC_KEY_PATH").ok().filter(|s| !s.is_empty());
        let secret = env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());

        match (public_key, secret) {
            (Some(_), Some(_)) => Err(AppError::ConfigError(
                "Set only one of JWT_PUBLIC_KEY_PATH and JWT_SECRET".to_string(),
            )),
            (Some(path), None) => Ok(Some(SigningKeySource::RsaPublicKeyPem(path.into()))),
            (None, Some(secret)) => Ok(Some(SigningKeySource::Secret(secret))),
            (None, None) => Ok(None),
        }
    }
}

fn parse_scheme_list(raw: &str) -> AppResult<Vec<AuthScheme>> {
    let mut schemes = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let scheme: AuthScheme = name
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid AUTH_SCHEMES: {e}")))?;
        if !schemes.contains(&scheme) {
            schemes.push(scheme);
        }
    }
    Ok(schemes)
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            // Authentication
            auth_schemes: vec![AuthScheme::Bearer, AuthScheme::ApiKey],
            token: TokenSettings::default(),
            api_key_header: "x-api-key".to_string(),
            api_key_query: "api_key".to_string(),
            auth_send_challenge: false,
            // Observability
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}
