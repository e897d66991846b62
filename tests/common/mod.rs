//! Shared helpers for router-level tests: configuration, token minting and
//! one-shot request dispatch.
#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::path::PathBuf;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use gateway_pipeline::config::{SigningKeySource, TokenSettings};
use gateway_pipeline::{AppState, Config, build_router};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-signing-secret";
pub const ISSUER: &str = "http://my.tokenissuer.com";
pub const AUDIENCE: &str = "https://my.company.com";

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Default configuration with HS256 bearer tokens enabled.
pub fn hs256_config() -> Config {
    Config {
        token: TokenSettings {
            signing_key: Some(SigningKeySource::Secret(SECRET.to_string())),
            ..TokenSettings::default()
        },
        ..Config::default()
    }
}

/// Default configuration verifying RS256 tokens with the fixture public key.
pub fn rs256_config() -> Config {
    Config {
        token: TokenSettings {
            signing_key: Some(SigningKeySource::RsaPublicKeyPem(fixture(
                "signing_key.pub.pem",
            ))),
            ..TokenSettings::default()
        },
        ..Config::default()
    }
}

pub fn app(config: Config) -> Router {
    build_router(AppState::new(config).expect("state should build"))
}

/// Claims of a token that passes every check; adjust fields per test.
pub fn valid_claims() -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "TestUserName",
        "email": "testuser@mycompany.com",
        "MyCustomClaim": "My special value",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": now,
        "nbf": now - 60,
        "exp": now + 3600,
    })
}

pub fn hs256_token(claims: &Value) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn rs256_token(claims: &Value, private_key: &str) -> String {
    let pem = std::fs::read(fixture(private_key)).unwrap();
    encode(
        &Header::new(Algorithm::RS256),
        claims,
        &EncodingKey::from_rsa_pem(&pem).unwrap(),
    )
    .unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}
