//! Identity provider and profile store contracts.
//!
//! [`AuthBackend`] is the stateless token API of the hosted backend, used
//! per request by the HTTP server. [`IdentityProvider`] is the stateful,
//! client-side view of one signed-in identity (current session plus a
//! change-notification stream) consumed by [`crate::session::AuthContext`].

pub mod hosted;

pub use hosted::HostedIdentityProvider;

use crate::domain::{AuthenticatedUser, IdentitySession, SignUpInput, UserProfile};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identity transition notified by the provider
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(IdentitySession),
    SignedOut,
}

/// Stateless token operations of the hosted auth service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthBackend: Send + Sync + 'static {
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<IdentitySession>;
    async fn sign_up(&self, input: &SignUpInput) -> Result<Uuid>;
    /// Revoke the session behind `access_token`
    async fn sign_out(&self, access_token: &str) -> Result<()>;
    /// Resolve an access token; `None` when the token is invalid or expired
    async fn get_user(&self, access_token: &str) -> Result<Option<AuthenticatedUser>>;
    /// Cheap reachability check used for readiness
    async fn ping(&self) -> Result<()>;
}

/// Stateful identity provider holding the current session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Current session, if any
    async fn get_session(&self) -> Result<Option<IdentitySession>>;
    /// Stream of sign-in/sign-out transitions
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentitySession>;
    async fn sign_up(&self, input: &SignUpInput) -> Result<Uuid>;
    async fn sign_out(&self) -> Result<()>;
}

/// Point lookup of user profiles
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    /// Profile readable with the given access token (row-level security applies)
    async fn find_by_user_id(&self, access_token: &str, user_id: Uuid)
        -> Result<Option<UserProfile>>;
}
