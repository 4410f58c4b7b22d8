//! Identity session domain model

use super::profile::UserProfile;
use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session issued by the identity provider.
///
/// The application only keeps a read-only copy; the provider remains the
/// source of truth for its validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: Uuid,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl IdentitySession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// User resolved from an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Identity behind one API request: the bearer token it came with, the
/// user that token resolves to and that user's profile, if one could be read.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub access_token: String,
    pub user: AuthenticatedUser,
    pub profile: Option<UserProfile>,
}

impl Caller {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// Role from the profile; `viewer` when none was loaded
    pub fn role(&self) -> Role {
        self.profile.as_ref().map(|p| p.role).unwrap_or_default()
    }
}
