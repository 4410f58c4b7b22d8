//! User profile domain model

use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Profile row owned by the hosted backend, one per user id.
///
/// The role is only ever read here; changing it is an out-of-band
/// administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            display_name: None,
            role,
            created_at: Utc::now(),
        }
    }
}

/// Input for registering a new account
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignUpInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 255))]
    pub display_name: Option<String>,
}

/// Input for password sign-in
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignInInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}
