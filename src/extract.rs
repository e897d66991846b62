//! Custom path extractors.
//!
//! - [`Base64Segment`]: a single path parameter in "modified base64", decoded to bytes
//! - [`WildcardSegments`]: a catch-all parameter split on `/`
//!
//! Both expect the route to capture exactly one parameter.

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use data_encoding::BASE64;
use tracing::debug;

use crate::error::AppError;

/// Maximum trailing `=` allowed by the segment constraint.
const MAX_PADDING: usize = 3;

/// Bytes from a base64 path segment.
///
/// URL-safe substitutions are accepted (`-` for `+`, `_` for `/`), so both
/// `/blobs/aGk_` and `/blobs/aGk%2F` decode the same way. Padding is required.
///
/// A segment with characters outside the base64 alphabet does not match the
/// route (404). One that matches but does not decode is a bad request (400).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Segment(pub Vec<u8>);

impl Base64Segment {
    /// Route constraint: `^[A-Za-z0-9+/\-_]*={0,3}$`.
    pub fn matches(segment: &str) -> bool {
        let body = segment.trim_end_matches('=');
        segment.len() - body.len() <= MAX_PADDING
            && body
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'-' | b'_'))
    }

    pub fn decode(segment: &str) -> Result<Vec<u8>, AppError> {
        if !Self::matches(segment) {
            return Err(AppError::NotFound(
                "No resource matches the requested path".to_string(),
            ));
        }

        let standard = segment.replace('-', "+").replace('_', "/");
        BASE64.decode(standard.as_bytes()).map_err(|e| {
            debug!(error = %e, "Rejecting undecodable base64 segment");
            AppError::BadRequest("Path segment is not valid base64".to_string())
        })
    }
}

impl<S> FromRequestParts<S> for Base64Segment
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(segment) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Self::decode(&segment).map(Self)
    }
}

/// Segments of a catch-all route parameter, e.g. `/files/{*path}` with
/// `/files/a/b/c` gives `["a", "b", "c"]`. Empty segments are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardSegments(pub Vec<String>);

impl<S> FromRequestParts<S> for WildcardSegments
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(rest) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(rest.split('/').map(str::to_string).collect()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    #[test]
    fn test_constraint() {
        assert!(Base64Segment::matches("aGVsbG8="));
        assert!(Base64Segment::matches("a-_b"));
        assert!(Base64Segment::matches(""));
        assert!(Base64Segment::matches("YQ=="));
        assert!(!Base64Segment::matches("YQ===="));
        assert!(!Base64Segment::matches("a=b"));
        assert!(!Base64Segment::matches("hello world"));
        assert!(!Base64Segment::matches("abc!"));
    }

    #[test]
    fn test_decode_modified_alphabet() {
        // 0xfb 0xff encodes to "+/8=" in standard base64
        assert_eq!(Base64Segment::decode("-_8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(Base64Segment::decode("+/8=").unwrap(), vec![0xfb, 0xff]);
        assert_eq!(Base64Segment::decode("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Base64Segment::decode("abc!"),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            Base64Segment::decode("aGVsbG8"),
            Err(AppError::BadRequest(_))
        ));
    }

    async fn status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_extractors_in_router() {
        let app = Router::new()
            .route(
                "/blobs/{data}",
                get(|Base64Segment(bytes): Base64Segment| async move { bytes.len().to_string() }),
            )
            .route(
                "/files/{*path}",
                get(|WildcardSegments(parts): WildcardSegments| async move { parts.join("|") }),
            );

        assert_eq!(status(app.clone(), "/blobs/aGVsbG8=").await, StatusCode::OK);
        assert_eq!(status(app.clone(), "/blobs/aGVsbG8").await, StatusCode::BAD_REQUEST);
        assert_eq!(status(app.clone(), "/blobs/he!!o").await, StatusCode::NOT_FOUND);
        assert_eq!(status(app, "/files/a/b/c").await, StatusCode::OK);
    }
}
