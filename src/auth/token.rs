//! Bearer token (JWT) validation.
//!
//! A credential that is not a JWT at all is reported as
//! [`TokenError::UnrecognizedFormat`] so the next authenticator in the chain
//! can try it. Well-formed tokens are checked for signature, issuer, audience
//! and lifetime; an `exp` claim is mandatory.
//!
//! Lifetime failures are kept apart from every other failure so they can be
//! logged and counted separately. Callers never learn which other check
//! (signature, issuer, audience) rejected the token.

use axum::http::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::credentials::{CredentialExtractor, Extraction};
use super::principal::{AuthScheme, Claim, ISSUER_CLAIM, Principal, TOKEN_SCHEME_CLAIM};
use super::{AuthError, Authentication, Authenticator};
use crate::config::{SigningKeySource, TokenSettings};
use crate::error::{AppError, AppResult};

/// Why a token's validity window rejected it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifetimeError {
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
    #[error("token has no expiry")]
    MissingExpiry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not a JWT; some other validator may understand it.
    #[error("credential is not a recognized token format")]
    UnrecognizedFormat,

    #[error("security token lifetime error: {0}")]
    Lifetime(LifetimeError),

    #[error("invalid security token")]
    Invalid,
}

impl TokenError {
    pub fn is_lifetime(&self) -> bool {
        matches!(self, TokenError::Lifetime(_))
    }
}

/// Validates signed bearer tokens against one issuer, one audience and one key.
pub struct TokenValidator {
    extractor: CredentialExtractor,
    key: DecodingKey,
    validation: Validation,
    subject_claim: String,
}

impl TokenValidator {
    pub fn new(key: DecodingKey, algorithm: Algorithm, settings: &TokenSettings) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_audience(&[settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = settings.clock_skew.as_secs();

        Self {
            extractor: CredentialExtractor::new(AuthScheme::Bearer),
            key,
            validation,
            subject_claim: settings.subject_claim.clone(),
        }
    }

    /// Build from configuration, loading key material once.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if no key is configured or the PEM file
    /// cannot be read or parsed.
    pub fn from_settings(settings: &TokenSettings) -> AppResult<Self> {
        match &settings.signing_key {
            None => Err(AppError::ConfigError(
                "Bearer authentication requires JWT_SECRET or JWT_PUBLIC_KEY_PATH".to_string(),
            )),
            Some(SigningKeySource::Secret(secret)) => Ok(Self::new(
                DecodingKey::from_secret(secret.as_bytes()),
                Algorithm::HS256,
                settings,
            )),
            Some(SigningKeySource::RsaPublicKeyPem(path)) => {
                let pem = std::fs::read(path).map_err(|e| {
                    AppError::ConfigError(format!(
                        "Failed to read JWT public key {}: {e}",
                        path.display()
                    ))
                })?;
                let key = DecodingKey::from_rsa_pem(&pem).map_err(|e| {
                    AppError::ConfigError(format!(
                        "Invalid JWT public key {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(Self::new(key, Algorithm::RS256, settings))
            }
        }
    }

    /// Validate a token and build its principal.
    ///
    /// The principal's claims are the token's claims (array values become one
    /// claim per element) followed by [`ISSUER_CLAIM`] and
    /// [`TOKEN_SCHEME_CLAIM`].
    pub fn validate(&self, token: &str) -> Result<Principal, TokenError> {
        if decode_header(token).is_err() {
            return Err(TokenError::UnrecognizedFormat);
        }

        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|e| classify(e.kind()))?;
        let token_claims = data.claims;

        let Some(subject) = token_claims
            .get(&self.subject_claim)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        else {
            debug!(claim = %self.subject_claim, "Token lacks a subject claim");
            return Err(TokenError::Invalid);
        };

        let issuer = token_claims
            .get("iss")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut claims = flatten_claims(&token_claims);
        claims.push(Claim::new(ISSUER_CLAIM, issuer));
        claims.push(Claim::new(TOKEN_SCHEME_CLAIM, AuthScheme::Bearer.as_str()));

        Principal::authenticated(subject, AuthScheme::Bearer, claims).ok_or(TokenError::Invalid)
    }
}

impl Authenticator for TokenValidator {
    fn scheme(&self) -> AuthScheme {
        AuthScheme::Bearer
    }

    fn authenticate(&self, headers: &HeaderMap, query: Option<&str>) -> Authentication {
        let credential = match self.extractor.extract(headers, query) {
            Extraction::NotPresent => return Authentication::NotApplicable,
            Extraction::Empty => {
                return Authentication::Failed {
                    scheme: AuthScheme::Bearer,
                    error: AuthError::MissingCredentials,
                };
            }
            Extraction::Present(credential) => credential,
        };

        match self.validate(credential.value()) {
            Ok(principal) => Authentication::Authenticated {
                principal,
                credential,
            },
            Err(TokenError::UnrecognizedFormat) => {
                debug!("Bearer credential is not a JWT, deferring to other authenticators");
                Authentication::NotApplicable
            }
            Err(e) => Authentication::Failed {
                scheme: AuthScheme::Bearer,
                error: AuthError::Token(e),
            },
        }
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Lifetime(LifetimeError::Expired),
        ErrorKind::ImmatureSignature => TokenError::Lifetime(LifetimeError::NotYetValid),
        ErrorKind::MissingRequiredClaim(claim) if claim == "exp" => {
            TokenError::Lifetime(LifetimeError::MissingExpiry)
        }
        other => {
            debug!(reason = ?other, "Token failed validation");
            TokenError::Invalid
        }
    }
}

fn flatten_claims(token_claims: &Map<String, Value>) -> Vec<Claim> {
    let mut claims = Vec::with_capacity(token_claims.len() + 2);
    for (claim_type, value) in token_claims {
        match value {
            Value::Null => {}
            Value::Array(items) => claims.extend(
                items
                    .iter()
                    .map(|item| Claim::new(claim_type.as_str(), claim_value(item))),
            ),
            other => claims.push(Claim::new(claim_type.as_str(), claim_value(other))),
        }
    }
    claims
}

fn claim_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
