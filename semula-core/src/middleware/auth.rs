//! Caller extractors
//!
//! Provides:
//! - `Caller` extractor for handlers requiring a signed-in user
//! - `OptionalCaller` for handlers that also serve anonymous requests
//!
//! The bearer token is resolved against the hosted auth service on every
//! request, then the caller's profile is read with that same token. A
//! profile that cannot be read leaves the caller without one, which the
//! authorization engine treats as `viewer`.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::domain::Caller;
use crate::identity::{AuthBackend, ProfileStore};
use crate::state::HasServices;

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No Authorization header present
    MissingToken,
    /// Invalid Authorization header format
    InvalidHeader(String),
    /// Token rejected by the auth service
    InvalidToken,
    /// Auth service could not be asked
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing authorization token",
            ),
            AuthError::InvalidHeader(_) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid authorization header",
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid or expired token",
            ),
            AuthError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                "Authentication service unavailable",
            ),
        };

        let body = serde_json::json!({
            "error": error,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Extract the Bearer token from the Authorization header
pub(crate) fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Invalid header encoding".to_string()))?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AuthError::InvalidHeader("Authorization header must use Bearer scheme".to_string())
    })?;

    if token.trim().is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token.trim())
}

/// Resolve a token into a caller, loading the profile when possible
async fn resolve_caller<S: HasServices>(state: &S, token: &str) -> Result<Caller, AuthError> {
    let user = match state.auth_backend().get_user(token).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(AuthError::InvalidToken),
        Err(e) => {
            warn!(error = %e, "failed to resolve access token");
            return Err(AuthError::Unavailable);
        }
    };

    let profile = match state.profile_store().find_by_user_id(token, user.id).await {
        Ok(Some(profile)) => Some(profile),
        Ok(None) => {
            warn!(user_id = %user.id, "no profile for caller; treating as viewer");
            metrics::counter!("semula_profile_fetch_failures_total", "reason" => "not_found")
                .increment(1);
            None
        }
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "profile lookup failed; treating as viewer");
            metrics::counter!("semula_profile_fetch_failures_total", "reason" => "error")
                .increment(1);
            None
        }
    };

    Ok(Caller {
        access_token: token.to_string(),
        user,
        profile,
    })
}

/// Axum extractor for signed-in callers
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(caller: Caller) -> impl IntoResponse {
///     format!("Hello, {}!", caller.user_id())
/// }
/// ```
impl<S> FromRequestParts<S> for Caller
where
    S: HasServices,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?.to_string();
        resolve_caller(state, &token).await
    }
}

/// Optional caller extractor
///
/// Returns `Some(Caller)` if a valid token is present, `None` otherwise.
#[derive(Debug, Clone)]
pub struct OptionalCaller(pub Option<Caller>);

impl<S> FromRequestParts<S> for OptionalCaller
where
    S: HasServices,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Caller::from_request_parts(parts, state).await {
            Ok(caller) => Ok(OptionalCaller(Some(caller))),
            Err(_) => Ok(OptionalCaller(None)),
        }
    }
}
