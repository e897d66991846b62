//! # Gateway Pipeline
//!
//! An HTTP API gateway request pipeline on Axum: proxy header normalization,
//! credential extraction, JWT and API key authentication, and declarative
//! per-route authorization.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Catch Panic → Trace → Timer → Forwarded → Authenticate     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Authorize (per-route PolicySet)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, values, whoami, blobs, files)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stages share one typed [`RequestContext`] per request and either pass the
//! request on or answer it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gateway_pipeline::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config.clone())?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Authentication Configuration
//!
//! Verify bearer tokens with a shared secret or an RSA public key:
//! ```bash
//! JWT_SECRET=change-me cargo run
//! JWT_PUBLIC_KEY_PATH=/etc/gateway/signing.pub.pem cargo run
//! ```
//!
//! Prefer API keys over tokens when both are sent:
//! ```bash
//! AUTH_SCHEMES=ApiKey,Bearer cargo run
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use context::{Authenticated, ClientBaseUrl, ClientOrigin, RequestContext};
pub use error::{AppError, AppResult};
pub use policy::{Policy, PolicySet};
pub use routes::build_router;
pub use state::AppState;
