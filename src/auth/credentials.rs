//! Credential extraction, independent of how the credential is validated.
//!
//! A [`CredentialExtractor`] is configured for one scheme and looks, in order:
//!
//! 1. at a dedicated header (e.g. `X-API-Key`), if configured
//! 2. at a query parameter (key matched case-insensitively), if configured
//! 3. at `Authorization: <scheme> <parameter>`, only when the scheme token
//!    matches exactly
//!
//! Empty header and query values are skipped. An `Authorization` header whose
//! scheme matches but carries no parameter is reported as [`Extraction::Empty`],
//! which validators turn into a "Missing credentials" failure.

use axum::http::header::{AUTHORIZATION, HeaderMap, HeaderName};
use tracing::debug;
use url::form_urlencoded;

use super::principal::AuthScheme;

/// Where in the request a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialChannel {
    Header,
    Query,
    Authorization,
}

/// A raw credential pulled from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    channel: CredentialChannel,
    scheme: AuthScheme,
}

impl Credential {
    pub fn new(value: impl Into<String>, channel: CredentialChannel, scheme: AuthScheme) -> Self {
        Self {
            value: value.into(),
            channel,
            scheme,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn channel(&self) -> CredentialChannel {
        self.channel
    }

    /// The scheme whose extractor found this credential.
    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }
}

/// Result of looking for a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// No source carried a value for this scheme.
    NotPresent,
    /// `Authorization` named this scheme but had no parameter.
    Empty,
    Present(Credential),
}

/// Pulls a credential for one scheme out of headers and the query string.
#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    scheme: AuthScheme,
    header: Option<HeaderName>,
    query_key: Option<String>,
}

impl CredentialExtractor {
    /// An extractor that only reads `Authorization: <scheme> ...`.
    pub fn new(scheme: AuthScheme) -> Self {
        Self {
            scheme,
            header: None,
            query_key: None,
        }
    }

    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = Some(header);
        self
    }

    pub fn with_query_key(mut self, key: impl Into<String>) -> Self {
        self.query_key = Some(key.into());
        self
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn extract(&self, headers: &HeaderMap, query: Option<&str>) -> Extraction {
        if let Some(ref name) = self.header
            && let Some(value) = headers.get(name)
            && let Ok(value) = value.to_str()
            && !value.trim().is_empty()
        {
            return Extraction::Present(Credential::new(
                value.trim(),
                CredentialChannel::Header,
                self.scheme,
            ));
        }

        if let Some(ref key) = self.query_key
            && let Some(query) = query
            && let Some(value) = find_query_value(query, key)
        {
            debug!(scheme = %self.scheme, "Credential provided via query parameter");
            return Extraction::Present(Credential::new(
                value,
                CredentialChannel::Query,
                self.scheme,
            ));
        }

        let Some(authorization) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            return Extraction::NotPresent;
        };

        let (scheme, parameter) = split_authorization(authorization);
        if scheme != self.scheme.as_str() {
            // Another scheme's header; this extractor does not apply.
            return Extraction::NotPresent;
        }

        if parameter.is_empty() {
            Extraction::Empty
        } else {
            Extraction::Present(Credential::new(
                parameter,
                CredentialChannel::Authorization,
                self.scheme,
            ))
        }
    }
}

/// Split `"<scheme> <parameter>"` on the first run of whitespace.
fn split_authorization(value: &str) -> (&str, &str) {
    let value = value.trim();
    match value.split_once(char::is_whitespace) {
        Some((scheme, parameter)) => (scheme, parameter.trim()),
        None => (value, ""),
    }
}

/// First non-empty, percent-decoded value whose key matches case-insensitively.
fn find_query_value(query: &str, key: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn api_key_extractor() -> CredentialExtractor {
        CredentialExtractor::new(AuthScheme::ApiKey)
            .with_header(HeaderName::from_static("x-api-key"))
            .with_query_key("api_key")
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_extract_from_header() {
        let extraction = api_key_extractor().extract(&headers(&[("x-api-key", "R12345")]), None);

        let Extraction::Present(credential) = extraction else {
            panic!("expected a credential, got {extraction:?}");
        };
        assert_eq!(credential.value(), "R12345");
        assert_eq!(credential.channel(), CredentialChannel::Header);
        assert_eq!(credential.scheme(), AuthScheme::ApiKey);
    }

    #[test]
    fn test_extract_from_query_case_insensitive_key() {
        let extraction =
            api_key_extractor().extract(&HeaderMap::new(), Some("other=1&API_KEY=W12345"));

        let Extraction::Present(credential) = extraction else {
            panic!("expected a credential, got {extraction:?}");
        };
        assert_eq!(credential.value(), "W12345");
        assert_eq!(credential.channel(), CredentialChannel::Query);
    }

    #[test]
    fn test_query_value_is_percent_decoded() {
        let extraction = api_key_extractor().extract(&HeaderMap::new(), Some("api_key=R%2B2345"));
        assert_eq!(
            extraction,
            Extraction::Present(Credential::new(
                "R+2345",
                CredentialChannel::Query,
                AuthScheme::ApiKey
            ))
        );
    }

    #[test]
    fn test_header_takes_priority_over_query() {
        let extraction = api_key_extractor().extract(
            &headers(&[("x-api-key", "header-key")]),
            Some("api_key=query-key"),
        );

        let Extraction::Present(credential) = extraction else {
            panic!("expected a credential, got {extraction:?}");
        };
        assert_eq!(credential.value(), "header-key");
    }

    #[test]
    fn test_empty_header_falls_through_to_authorization() {
        let extraction = api_key_extractor().extract(
            &headers(&[("x-api-key", ""), ("authorization", "ApiKey R12345")]),
            None,
        );

        let Extraction::Present(credential) = extraction else {
            panic!("expected a credential, got {extraction:?}");
        };
        assert_eq!(credential.channel(), CredentialChannel::Authorization);
        assert_eq!(credential.value(), "R12345");
    }

    #[test]
    fn test_authorization_scheme_is_case_sensitive() {
        let extraction =
            api_key_extractor().extract(&headers(&[("authorization", "apikey R12345")]), None);
        assert_eq!(extraction, Extraction::NotPresent);
    }

    #[test]
    fn test_other_scheme_is_not_present() {
        let extraction =
            api_key_extractor().extract(&headers(&[("authorization", "Bearer abc.def.ghi")]), None);
        assert_eq!(extraction, Extraction::NotPresent);
    }

    #[test]
    fn test_matching_scheme_without_parameter_is_empty() {
        let extractor = CredentialExtractor::new(AuthScheme::Bearer);
        assert_eq!(
            extractor.extract(&headers(&[("authorization", "Bearer")]), None),
            Extraction::Empty
        );
        assert_eq!(
            extractor.extract(&headers(&[("authorization", "Bearer   ")]), None),
            Extraction::Empty
        );
    }

    #[test]
    fn test_nothing_present() {
        assert_eq!(
            api_key_extractor().extract(&HeaderMap::new(), Some("page=2")),
            Extraction::NotPresent
        );
    }

    #[test]
    fn test_bearer_extractor_ignores_api_key_header() {
        let extractor = CredentialExtractor::new(AuthScheme::Bearer);
        assert_eq!(
            extractor.extract(&headers(&[("x-api-key", "R12345")]), Some("api_key=R12345")),
            Extraction::NotPresent
        );
    }
}
