//! Client-side session holder on top of the hosted auth service

use super::{AuthBackend, AuthEvent, IdentityProvider};
use crate::domain::{IdentitySession, SignUpInput};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Keeps the current session and broadcasts transitions to subscribers.
///
/// The backend stays the source of truth: a failed sign-out leaves the
/// stored session in place.
pub struct HostedIdentityProvider<B: AuthBackend> {
    backend: Arc<B>,
    session: Arc<RwLock<Option<IdentitySession>>>,
    events: broadcast::Sender<AuthEvent>,
}

impl<B: AuthBackend> HostedIdentityProvider<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            session: Arc::new(RwLock::new(None)),
            events,
        }
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl<B: AuthBackend> IdentityProvider for HostedIdentityProvider<B> {
    async fn get_session(&self) -> Result<Option<IdentitySession>> {
        let mut session = self.session.write().await;
        let expired = session
            .as_ref()
            .is_some_and(|s| s.is_expired(Utc::now()));

        if expired {
            debug!("stored session expired");
            *session = None;
            drop(session);
            self.emit(AuthEvent::SignedOut);
            return Ok(None);
        }

        Ok(session.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentitySession> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        {
            let mut current = self.session.write().await;
            *current = Some(session.clone());
        }
        info!(user_id = %session.user_id, "signed in");
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, input: &SignUpInput) -> Result<Uuid> {
        self.backend.sign_up(input).await
    }

    async fn sign_out(&self) -> Result<()> {
        let token = {
            let current = self.session.read().await;
            current.as_ref().map(|s| s.access_token.clone())
        };

        if let Some(token) = token {
            self.backend.sign_out(&token).await?;
        }

        {
            let mut current = self.session.write().await;
            *current = None;
        }
        info!("signed out");
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }
}
