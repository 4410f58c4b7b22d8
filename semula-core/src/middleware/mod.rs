//! HTTP middleware for Semula Core
//!
//! - Caller extractors resolving bearer tokens against the auth service
//! - Per-route request metrics and request ids

pub mod auth;
pub mod metrics;

pub use auth::{AuthError, OptionalCaller};
pub use metrics::track_requests;
