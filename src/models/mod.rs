mod api;

pub use api::{
    BlobResponse, CreateValueRequest, HealthResponse, MAX_VALUE_LENGTH, PathSegmentsResponse,
    PrincipalResponse, ValueResponse,
};
