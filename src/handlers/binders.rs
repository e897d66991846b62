//! Endpoints exercising the custom path extractors.

use axum::Json;
use data_encoding::HEXLOWER;
use tracing::instrument;

use crate::extract::{Base64Segment, WildcardSegments};
use crate::models::{BlobResponse, PathSegmentsResponse};

/// `GET /blobs/{data}` - decode a modified-base64 segment.
#[instrument(skip_all)]
pub async fn decode_blob(Base64Segment(bytes): Base64Segment) -> Json<BlobResponse> {
    Json(BlobResponse {
        length: bytes.len(),
        hex: HEXLOWER.encode(&bytes),
    })
}

/// `GET /files/{*path}` - echo the path split into segments.
#[instrument(skip_all)]
pub async fn split_path(WildcardSegments(segments): WildcardSegments) -> Json<PathSegmentsResponse> {
    Json(PathSegmentsResponse { segments })
}
