//! Authorization: identity → allow or deny.
//!
//! Policies are plain data attached to a route when the router is built:
//!
//! ```rust,ignore
//! let policies = PolicySet::new()
//!     .with(Policy::RequireHttps)
//!     .with(Policy::require_claims("urn:MyCustomClaim", true));
//!
//! Router::new()
//!     .route("/values", get(list_values))
//!     .route_layer(AuthorizeLayer::new(policies));
//! ```
//!
//! A set holds at most one policy of each [`PolicyKind`]; adding a second one
//! of the same kind replaces the first in place. Policies run in insertion
//! order and the first denial wins.

mod denial;
mod layer;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use denial::Denial;
pub use layer::{AuthorizeLayer, AuthorizeService};

use crate::auth::AuthScheme;
use crate::context::RequestContext;

/// Length every well-formed API key has.
pub const API_KEY_LENGTH: usize = 6;

/// Read/write class encoded in an API key's first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyClass {
    Read,
    Write,
}

impl KeyClass {
    pub fn prefix(&self) -> char {
        match self {
            KeyClass::Read => 'R',
            KeyClass::Write => 'W',
        }
    }

    /// Whether `key` satisfies this class. A write key may do anything a read
    /// key may; only `Write` narrows.
    pub fn admits(&self, key: &str) -> bool {
        match self {
            KeyClass::Read => true,
            KeyClass::Write => key.starts_with('W'),
        }
    }
}

impl fmt::Display for KeyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("API key class must be \"R\" or \"W\", got {0:?}")]
pub struct KeyClassError(pub String);

impl FromStr for KeyClass {
    type Err = KeyClassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R" => Ok(KeyClass::Read),
            "W" => Ok(KeyClass::Write),
            other => Err(KeyClassError(other.to_string())),
        }
    }
}

/// Non-empty, starts with `R` or `W`, exactly [`API_KEY_LENGTH`] characters.
pub fn is_well_formed_api_key(key: &str) -> bool {
    (key.starts_with('R') || key.starts_with('W')) && key.chars().count() == API_KEY_LENGTH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Claims,
    ApiKey,
    Https,
}

impl PolicyKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Claims => "require_claims",
            PolicyKind::ApiKey => "require_api_key",
            PolicyKind::Https => "require_https",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Authenticated principal carrying every listed claim type
    /// (case-insensitive). An empty list only requires authentication.
    RequireClaims {
        claims: Vec<String>,
        include_missing: bool,
    },

    /// A well-formed API key authenticated the request, of the given class
    /// when one is set.
    RequireApiKey(Option<KeyClass>),

    /// The client-facing scheme is `https`.
    RequireHttps,
}

impl Policy {
    /// `RequireClaims` from a comma-separated list, e.g. `"urn:Issuer,urn:MyCustomClaim"`.
    /// Blank entries are dropped.
    pub fn require_claims(list: &str, include_missing: bool) -> Self {
        Policy::RequireClaims {
            claims: list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            include_missing,
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Policy::RequireClaims { .. } => PolicyKind::Claims,
            Policy::RequireApiKey(_) => PolicyKind::ApiKey,
            Policy::RequireHttps => PolicyKind::Https,
        }
    }

    /// Evaluate against the request context. A missing context is treated as
    /// a request no stage has vouched for.
    pub fn evaluate(&self, ctx: Option<&RequestContext>) -> AuthorizationDecision {
        match self {
            Policy::RequireClaims {
                claims,
                include_missing,
            } => {
                let Some(principal) = ctx
                    .and_then(|c| c.principal.as_ref())
                    .filter(|p| p.is_authenticated())
                else {
                    return AuthorizationDecision::Deny(Denial::unauthorized());
                };

                let missing: Vec<String> = claims
                    .iter()
                    .filter(|c| !principal.has_claim(c))
                    .cloned()
                    .collect();

                if missing.is_empty() {
                    AuthorizationDecision::Allow
                } else {
                    AuthorizationDecision::Deny(Denial::lacking_claims(missing, *include_missing))
                }
            }

            Policy::RequireApiKey(class) => {
                let key = ctx
                    .and_then(|c| c.credential.as_ref())
                    .filter(|c| c.scheme() == AuthScheme::ApiKey)
                    .map(|c| c.value())
                    .filter(|k| is_well_formed_api_key(k));

                match (key, class) {
                    (Some(key), Some(class)) if !class.admits(key) => {
                        AuthorizationDecision::Deny(Denial::invalid_api_key())
                    }
                    (Some(_), _) => AuthorizationDecision::Allow,
                    (None, _) => AuthorizationDecision::Deny(Denial::invalid_api_key()),
                }
            }

            Policy::RequireHttps => {
                let https = ctx
                    .and_then(|c| c.forwarding.as_ref())
                    .is_some_and(|f| f.is_https());

                if https {
                    AuthorizationDecision::Allow
                } else {
                    AuthorizationDecision::Deny(Denial::https_required())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Allow,
    Deny(Denial),
}

/// Ordered policies for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy, replacing any existing policy of the same kind in place.
    pub fn with(mut self, policy: Policy) -> Self {
        match self.policies.iter_mut().find(|p| p.kind() == policy.kind()) {
            Some(existing) => *existing = policy,
            None => self.policies.push(policy),
        }
        self
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// First denial wins; the policy that denied is returned with it.
    pub fn evaluate(&self, ctx: Option<&RequestContext>) -> Result<(), (PolicyKind, Denial)> {
        for policy in &self.policies {
            if let AuthorizationDecision::Deny(denial) = policy.evaluate(ctx) {
                return Err((policy.kind(), denial));
            }
        }
        Ok(())
    }
}

impl FromIterator<Policy> for PolicySet {
    fn from_iter<I: IntoIterator<Item = Policy>>(iter: I) -> Self {
        iter.into_iter().fold(Self::new(), Self::with)
    }
}
