//! Wire types of the hosted auth and REST gateway

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub(crate) struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub user: BackendUser,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BackendUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub data: SignUpMetadata<'a>,
}

/// User metadata copied into the profile row by a backend trigger
#[derive(Debug, Serialize)]
pub(crate) struct SignUpMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<&'a str>,
}

/// Sign-up answers with the user itself, or with `{user, session}` when
/// email confirmation is disabled.
#[derive(Debug, Deserialize)]
pub(crate) struct SignUpResponse {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub user: Option<BackendUser>,
}

impl SignUpResponse {
    pub fn user_id(&self) -> Option<Uuid> {
        self.id.or_else(|| self.user.as_ref().map(|u| u.id))
    }
}

/// Error body shapes used by the auth service and the REST gateway
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BackendErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl BackendErrorBody {
    pub fn text(&self) -> Option<&str> {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .or(self.error_description.as_deref())
    }
}

/// Total row count from a `Content-Range` header such as `0-19/137` or `*/0`
pub fn parse_content_range_total(header: &str) -> Option<u64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}
