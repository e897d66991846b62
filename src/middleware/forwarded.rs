//! Client-facing URL normalization from proxy headers.
//!
//! Reconstructs the scheme, host and port the *client* used, so handlers can
//! build links and transport checks can see through a TLS-terminating proxy.
//!
//! # Header Precedence
//!
//! Starting from the server's own view of the request, overrides are applied
//! in this order (later wins):
//!
//! 1. `X-Forwarded-Proto` (scheme)
//! 2. `X-Forwarded-Host` (host and optional port)
//! 3. `Forwarded` (RFC 7239, `proto=` and `host=` of the first element)
//!
//! Only the first comma-separated element of each header is used: that is the
//! hop closest to the client.
//!
//! # Security Warning
//!
//! **These headers are client-controlled.** Only deploy behind a proxy that
//! overwrites them. A client reaching this service directly can claim any
//! scheme, which matters for [`crate::policy::Policy::RequireHttps`].
//!
//! # Malformed Headers
//!
//! A header that cannot be parsed (non-ASCII bytes, a non-numeric port, a host
//! that does not form a URL) fails the request with 400 rather than silently
//! falling back to the server's view.

use axum::extract::{Request, State};
use axum::http::header::{FORWARDED, HOST};
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::context::RequestContextExt;
use crate::error::AppError;
use crate::metrics;
use crate::state::AppState;

/// Legacy proxy header carrying the original scheme.
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Legacy proxy header carrying the original `host[:port]`.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardedHeaderError {
    #[error("{header} is not valid ASCII")]
    NotAscii { header: &'static str },

    #[error("{header} carries an invalid port: {value}")]
    InvalidPort { header: &'static str, value: String },

    #[error("{header} carries an invalid host: {value}")]
    InvalidHost { header: &'static str, value: String },

    #[error("{header} carries an invalid scheme: {value}")]
    InvalidScheme { header: &'static str, value: String },
}

impl ForwardedHeaderError {
    /// The offending header. Safe to echo back to the client.
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::NotAscii { header }
            | Self::InvalidPort { header, .. }
            | Self::InvalidHost { header, .. }
            | Self::InvalidScheme { header, .. } => header,
        }
    }
}

/// The client-facing origin of a request.
///
/// Built once per request by [`normalize_forwarding`]; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingInfo {
    scheme: String,
    host: String,
    port: Option<u16>,
    base_url: Url,
}

impl ForwardingInfo {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// `scheme://host[:port]/`, default ports elided.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_https(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }

    /// Move `url` onto the client-facing origin, keeping path, query and fragment.
    pub fn rebase(&self, url: &Url) -> Url {
        let mut rebased = self.base_url.clone();
        rebased.set_path(url.path());
        rebased.set_query(url.query());
        rebased.set_fragment(url.fragment());
        rebased
    }

    /// Resolve an absolute path (with optional query) against the base URL.
    pub fn url_for(&self, path_and_query: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path_and_query)
    }
}

/// Mutable working copy while overrides are applied.
#[derive(Debug)]
struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
    host_source: &'static str,
}

impl Origin {
    /// The server's own view: absolute request URI, else `Host`, else the
    /// configured listen address.
    fn from_server_view(
        uri: &Uri,
        headers: &HeaderMap,
        listen_host: &str,
        listen_port: u16,
    ) -> Result<Self, ForwardedHeaderError> {
        if let Some(authority) = uri.authority() {
            return Ok(Self {
                scheme: uri.scheme_str().unwrap_or("http").to_string(),
                host: authority.host().to_string(),
                port: authority.port_u16(),
                host_source: "host",
            });
        }

        if let Some(value) = header_str(headers, HOST.as_str())? {
            let (host, port) = parse_host_port(value, "host")?;
            return Ok(Self {
                scheme: "http".to_string(),
                host,
                port,
                host_source: "host",
            });
        }

        Ok(Self {
            scheme: "http".to_string(),
            host: listen_host.to_string(),
            port: Some(listen_port),
            host_source: "host",
        })
    }

    fn set_scheme(&mut self, value: &str, header: &'static str) -> Result<(), ForwardedHeaderError> {
        if !is_valid_scheme(value) {
            return Err(ForwardedHeaderError::InvalidScheme {
                header,
                value: value.to_string(),
            });
        }
        self.scheme = value.to_ascii_lowercase();
        Ok(())
    }

    fn set_host(&mut self, value: &str, header: &'static str) -> Result<(), ForwardedHeaderError> {
        let (host, port) = parse_host_port(value, header)?;
        self.host = host;
        self.port = port;
        self.host_source = header;
        Ok(())
    }

    fn into_info(self) -> Result<ForwardingInfo, ForwardedHeaderError> {
        let authority = match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        };

        let base_url = Url::parse(&format!("{}://{authority}/", self.scheme))
            .ok()
            .filter(is_bare_origin)
            .ok_or_else(|| ForwardedHeaderError::InvalidHost {
                header: self.host_source,
                value: authority,
            })?;

        Ok(ForwardingInfo {
            scheme: self.scheme,
            host: self.host,
            port: self.port,
            base_url,
        })
    }
}

/// Compute the client-facing origin from the server view and proxy headers.
///
/// # Errors
///
/// Returns [`ForwardedHeaderError`] naming the first header that could not be
/// parsed.
pub fn resolve_forwarding(
    uri: &Uri,
    headers: &HeaderMap,
    listen_host: &str,
    listen_port: u16,
) -> Result<ForwardingInfo, ForwardedHeaderError> {
    let mut origin = Origin::from_server_view(uri, headers, listen_host, listen_port)?;

    if let Some(proto) = header_str(headers, X_FORWARDED_PROTO)?.and_then(first_element) {
        origin.set_scheme(proto, X_FORWARDED_PROTO)?;
    }

    if let Some(host) = header_str(headers, X_FORWARDED_HOST)?.and_then(first_element) {
        origin.set_host(host, X_FORWARDED_HOST)?;
    }

    if let Some(forwarded) = header_str(headers, FORWARDED.as_str())? {
        let (proto, host) = parse_forwarded(forwarded);
        if let Some(proto) = proto {
            origin.set_scheme(proto, "forwarded")?;
        }
        if let Some(host) = host {
            origin.set_host(host, "forwarded")?;
        }
    }

    origin.into_info()
}

/// Middleware: resolve the client-facing origin once and store it in the
/// request context. Malformed headers end the request with 400.
pub async fn normalize_forwarding(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if req
        .context()
        .is_some_and(|ctx| ctx.forwarding.is_some())
    {
        return next.run(req).await;
    }

    let resolved = resolve_forwarding(
        req.uri(),
        req.headers(),
        &state.config.host,
        state.config.port,
    );

    match resolved {
        Ok(info) => {
            debug!(base_url = %info.base_url(), "Resolved client origin");
            req.context_mut().forwarding = Some(info);
            next.run(req).await
        }
        Err(e) => {
            warn!(error = %e, "Rejecting request with malformed forwarding header");
            metrics::record_forwarded_header_error(e.header_name());
            AppError::from(e).into_response()
        }
    }
}

/// Header value as `&str`; absent or blank headers are `None`.
fn header_str<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<Option<&'a str>, ForwardedHeaderError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ForwardedHeaderError::NotAscii { header: name })?
        .trim();
    Ok((!value.is_empty()).then_some(value))
}

fn first_element(value: &str) -> Option<&str> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `proto` and `host` of the first `Forwarded` element. Keys match
/// case-insensitively; the first occurrence of each wins.
fn parse_forwarded(value: &str) -> (Option<&str>, Option<&str>) {
    let mut proto = None;
    let mut host = None;

    let element = value.split(',').next().unwrap_or_default();
    for pair in element.split(';') {
        let Some((key, raw)) = pair.trim().split_once('=') else {
            continue;
        };
        let value = unquote(raw.trim());
        if value.is_empty() {
            continue;
        }
        let key = key.trim();
        if key.eq_ignore_ascii_case("proto") && proto.is_none() {
            proto = Some(value);
        } else if key.eq_ignore_ascii_case("host") && host.is_none() {
            host = Some(value);
        }
    }

    (proto, host)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Split `host[:port]`. IPv6 literals must be bracketed.
fn parse_host_port(
    value: &str,
    header: &'static str,
) -> Result<(String, Option<u16>), ForwardedHeaderError> {
    let invalid_host = || ForwardedHeaderError::InvalidHost {
        header,
        value: value.to_string(),
    };
    let invalid_port = || ForwardedHeaderError::InvalidPort {
        header,
        value: value.to_string(),
    };

    if value.contains(is_delimiter) {
        return Err(invalid_host());
    }

    let (host, port) = if value.starts_with('[') {
        let end = value.find(']').ok_or_else(invalid_host)?;
        let (host, rest) = value.split_at(end + 1);
        match rest {
            "" => (host, None),
            _ => (host, Some(rest.strip_prefix(':').ok_or_else(invalid_host)?)),
        }
    } else {
        match value.split_once(':') {
            Some((_, port)) if port.contains(':') => return Err(invalid_host()),
            Some((host, port)) => (host, Some(port)),
            None => (value, None),
        }
    };

    if host.is_empty() || host == "[]" {
        return Err(invalid_host());
    }

    let port = port
        .map(|p| p.parse::<u16>().map_err(|_| invalid_port()))
        .transpose()?;

    Ok((host.to_string(), port))
}

/// Characters that would end the authority or smuggle userinfo into it.
fn is_delimiter(c: char) -> bool {
    matches!(c, '/' | '\\' | '?' | '#' | '@') || c.is_ascii_whitespace() || c.is_ascii_control()
}

/// Only scheme, host and port: root path, no userinfo, query or fragment.
fn is_bare_origin(url: &Url) -> bool {
    url.host_str().is_some()
        && url.path() == "/"
        && url.username().is_empty()
        && url.password().is_none()
        && url.query().is_none()
        && url.fragment().is_none()
}

fn is_valid_scheme(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
