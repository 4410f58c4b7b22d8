//! Sign-up, sign-in, sign-out and the caller's own permissions

use crate::api::{MessageResponse, SuccessResponse};
use crate::domain::{
    Caller, FilterSelection, IdentitySession, Role, SignInInput, SignUpInput, UserProfile,
};
use crate::error::Result;
use crate::identity::AuthBackend;
use crate::middleware::auth::OptionalCaller;
use crate::policy::{Permissions, Subject};
use crate::state::HasServices;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct SignUpResponse {
    pub user_id: Uuid,
}

/// Tokens handed to the client after a password sign-in
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl From<IdentitySession> for SessionResponse {
    fn from(session: IdentitySession) -> Self {
        Self {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            token_type: "Bearer".to_string(),
            expires_at: session.expires_at,
            user_id: session.user_id,
            email: session.email,
        }
    }
}

/// Who the caller is and what the current filter allows them to do
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub authenticated: bool,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub profile: Option<UserProfile>,
    pub role: Role,
    pub filter: FilterSelection,
    pub permissions: Permissions,
}

impl MeResponse {
    pub fn new(caller: Option<&Caller>, filter: FilterSelection) -> Self {
        let subject = Subject::for_caller(caller);
        Self {
            authenticated: subject.authenticated,
            user_id: caller.map(Caller::user_id),
            email: caller.and_then(|c| c.user.email.clone()),
            profile: caller.and_then(|c| c.profile.clone()),
            role: subject.role,
            permissions: Permissions::evaluate(&subject, &filter),
            filter,
        }
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign-up",
    tag = "Auth",
    request_body = SignUpInput,
    responses(
        (status = 201, description = "Account created", body = SignUpResponse),
        (status = 400, description = "Rejected by the auth service"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn sign_up<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<SignUpInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let user_id = state.auth_backend().sign_up(&input).await?;
    info!(user_id = %user_id, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(SignUpResponse { user_id })),
    ))
}

/// Exchange email and password for a session
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign-in",
    tag = "Auth",
    request_body = SignInInput,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn sign_in<S: HasServices>(
    State(state): State<S>,
    Json(input): Json<SignInInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let session = state
        .auth_backend()
        .sign_in_with_password(&input.email, &input.password)
        .await?;
    info!(user_id = %session.user_id, "signed in");

    Ok(Json(SuccessResponse::new(SessionResponse::from(session))))
}

/// Revoke the caller's session
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign-out",
    tag = "Auth",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 401, description = "Not signed in"),
        (status = 502, description = "Auth service failed; session unchanged")
    ),
    security(("bearer_jwt" = []))
)]
pub async fn sign_out<S: HasServices>(
    State(state): State<S>,
    caller: Caller,
) -> Result<impl IntoResponse> {
    state.auth_backend().sign_out(&caller.access_token).await?;
    info!(user_id = %caller.user_id(), "signed out");
    Ok(Json(MessageResponse::new("Signed out")))
}

/// Current identity, role and page permissions for a filter.
///
/// Anonymous requests are answered too, as a `viewer` without permissions.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Auth",
    params(
        ("program" = Option<String>, Query, description = "Program code or `all`"),
        ("kegiatan" = Option<String>, Query, description = "Kegiatan code or `all`"),
        ("output" = Option<String>, Query, description = "Output code or `all`"),
        ("komponen" = Option<String>, Query, description = "Komponen code or `all`"),
        ("sub_komponen" = Option<String>, Query, description = "Sub-komponen code or `all`"),
        ("akun" = Option<String>, Query, description = "Akun code or `all`")
    ),
    responses(
        (status = 200, description = "Caller and permissions", body = MeResponse)
    )
)]
pub async fn me<S: HasServices>(
    State(_state): State<S>,
    OptionalCaller(caller): OptionalCaller,
    Query(filter): Query<FilterSelection>,
) -> Result<impl IntoResponse> {
    Ok(Json(SuccessResponse::new(MeResponse::new(
        caller.as_ref(),
        filter,
    ))))
}
