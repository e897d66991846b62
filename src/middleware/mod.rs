//! The request pipeline, outermost stage first.
//!
//! - **Panic handler**: any panic below becomes a generic 500
//! - **Timer**: creates the [`RequestContext`](crate::context::RequestContext), stamps `X-API-Timer`
//! - **Forwarding**: resolves the client-facing origin from proxy headers
//! - **Authentication**: credential → principal
//! - **Authorization**: per-route [`PolicySet`](crate::policy::PolicySet)
//! - **Route stages**: per-route [`RouteTimerLayer`] and [`CacheControlLayer`],
//!   run only once authorization has passed
//!
//! # Architecture
//!
//! ```text
//! Request → Timer → Forwarded → Authenticate → Authorize → Handler → Response
//!             ↓         ↓             ↓             ↓
//!        X-API-Timer   400          401        401 / 403
//! ```
//!
//! Each stage either passes the request on or answers it; a short-circuited
//! response still travels back out through every outer stage.

pub mod authenticate;
pub mod cache_control;
pub mod forwarded;
pub mod panic;
pub mod route_timer;
pub mod timer;

pub use authenticate::authenticate;
pub use cache_control::{CacheControl, CacheControlLayer};
pub use forwarded::{ForwardedHeaderError, ForwardingInfo, normalize_forwarding, resolve_forwarding};
pub use panic::handle_panic;
pub use route_timer::RouteTimerLayer;
pub use timer::{API_TIMER_HEADER, PipelineTimerLayer};
