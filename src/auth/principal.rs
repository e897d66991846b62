//! Identities produced by successful credential validation.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Claim type recording which issuer minted a bearer token.
pub const ISSUER_CLAIM: &str = "urn:Issuer";

/// Claim type recording the authentication scheme that produced the principal.
pub const TOKEN_SCHEME_CLAIM: &str = "urn:TokenScheme";

/// Claim type holding the client account derived from an API key prefix.
pub const CLIENT_ACCOUNT_CLAIM: &str = "urn:ClientAccount";

/// Claim type holding the instant an API key was accepted.
pub const AUTHENTICATION_INSTANT_CLAIM: &str = "urn:AuthenticationInstant";

/// Authentication schemes understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthScheme {
    Bearer,
    ApiKey,
}

impl AuthScheme {
    /// The scheme token as it appears in an `Authorization` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Bearer => "Bearer",
            AuthScheme::ApiKey => "ApiKey",
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown authentication scheme '{0}' (expected Bearer or ApiKey)")]
pub struct UnknownSchemeError(pub String);

impl FromStr for AuthScheme {
    type Err = UnknownSchemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bearer" => Ok(AuthScheme::Bearer),
            "ApiKey" => Ok(AuthScheme::ApiKey),
            other => Err(UnknownSchemeError(other.to_string())),
        }
    }
}

/// A typed key/value fact attached to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

/// A resolved identity.
///
/// Claims keep their insertion order and claim types may repeat. An
/// authenticated principal always has a non-empty subject and at least one
/// claim; [`Principal::authenticated`] refuses to build anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    subject: String,
    scheme: AuthScheme,
    claims: Vec<Claim>,
    authenticated: bool,
}

impl Principal {
    /// Build an authenticated principal, or `None` if the subject is empty or
    /// there are no claims.
    pub fn authenticated(
        subject: impl Into<String>,
        scheme: AuthScheme,
        claims: Vec<Claim>,
    ) -> Option<Self> {
        let subject = subject.into();
        if subject.is_empty() || claims.is_empty() {
            return None;
        }
        Some(Self {
            subject,
            scheme,
            claims,
            authenticated: true,
        })
    }

    /// An identity that carries a scheme tag but was never authenticated.
    pub fn anonymous(scheme: AuthScheme) -> Self {
        Self {
            subject: String::new(),
            scheme,
            claims: Vec::new(),
            authenticated: false,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether any claim has the given type (ASCII case-insensitive).
    pub fn has_claim(&self, claim_type: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type.eq_ignore_ascii_case(claim_type))
    }

    /// First value of the given claim type (ASCII case-insensitive).
    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type.eq_ignore_ascii_case(claim_type))
            .map(|c| c.value.as_str())
    }
}
