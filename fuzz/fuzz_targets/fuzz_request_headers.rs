//! Fuzz testing for request-header parsing.
//!
//! Feeds arbitrary bytes to every parser that sees raw client input before
//! authentication: forwarding headers, credential lookup and the base64 path
//! segment decoder. None of them may panic, whatever the input.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_request_headers -- -max_total_time=60
//! ```

#![no_main]

use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, Uri};
use gateway_pipeline::auth::{AuthScheme, CredentialExtractor};
use gateway_pipeline::extract::Base64Segment;
use gateway_pipeline::middleware::resolve_forwarding;
use libfuzzer_sys::fuzz_target;

const HEADERS: [&str; 5] = [
    "host",
    "x-forwarded-proto",
    "x-forwarded-host",
    "forwarded",
    "authorization",
];

fuzz_target!(|data: &[u8]| {
    // Split the input into one value per header on 0xff
    let mut headers = HeaderMap::new();
    for (name, value) in HEADERS.iter().zip(data.split(|b| *b == 0xff)) {
        if let Ok(value) = HeaderValue::from_bytes(value) {
            headers.insert(HeaderName::from_static(*name), value);
        }
    }

    let _ = resolve_forwarding(&Uri::from_static("/"), &headers, "0.0.0.0", 3000);

    let extractor = CredentialExtractor::new(AuthScheme::ApiKey)
        .with_header(HeaderName::from_static("x-api-key"))
        .with_query_key("api_key");
    let query = std::str::from_utf8(data).ok();
    let _ = extractor.extract(&headers, query);

    if let Some(segment) = query {
        let _ = Base64Segment::decode(segment);
    }
});
