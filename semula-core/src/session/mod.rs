//! Identity/session state machine and profile cache.
//!
//! ```text
//! Uninitialized ──init──▶ Loading ──session──▶ Authenticated ◀─┐
//!                            │                     │ SignedOut  │ SignedIn
//!                            └──no session──▶ Anonymous ────────┘
//! ```
//!
//! An [`AuthContext`] is owned explicitly by whoever needs it and has an
//! explicit lifecycle: [`AuthContext::init`] subscribes to the provider's
//! event stream, [`AuthContext::teardown`] releases that subscription.

use crate::domain::{IdentitySession, Role, SignUpInput, UserProfile};
use crate::error::Result;
use crate::identity::{AuthEvent, IdentityProvider, ProfileStore};
use crate::policy::Subject;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Authenticated,
    Anonymous,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Loading => "loading",
            SessionState::Authenticated => "authenticated",
            SessionState::Anonymous => "anonymous",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: SessionState,
    session: Option<IdentitySession>,
    profile: Option<UserProfile>,
    /// Token of the only profile fetch whose response may still be applied
    latest_fetch: u64,
}

/// Point-in-time view of the context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSnapshot {
    pub state: SessionState,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub profile: Option<UserProfile>,
    pub role: Role,
}

/// Owns the current identity, its profile and the provider subscription
pub struct AuthContext<P: IdentityProvider, S: ProfileStore> {
    provider: Arc<P>,
    profiles: Arc<S>,
    inner: Arc<RwLock<Inner>>,
    fetch_seq: Arc<AtomicU64>,
    /// Token of the last profile fetch that was applied or invalidated
    settled: Arc<watch::Sender<u64>>,
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl<P: IdentityProvider, S: ProfileStore> Clone for AuthContext<P, S> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            profiles: self.profiles.clone(),
            inner: self.inner.clone(),
            fetch_seq: self.fetch_seq.clone(),
            settled: self.settled.clone(),
            listener: self.listener.clone(),
        }
    }
}

impl<P: IdentityProvider, S: ProfileStore> AuthContext<P, S> {
    pub fn new(provider: Arc<P>, profiles: Arc<S>) -> Self {
        Self {
            provider,
            profiles,
            inner: Arc::new(RwLock::new(Inner::default())),
            fetch_seq: Arc::new(AtomicU64::new(0)),
            settled: Arc::new(watch::Sender::new(0)),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to provider events and resolve the initial session.
    ///
    /// A no-op unless the context is `Uninitialized`.
    pub async fn init(&self) {
        {
            let mut inner = self.inner.write().await;
            if inner.state != SessionState::Uninitialized {
                debug!(state = inner.state.as_str(), "auth context already initialised");
                return;
            }
            inner.state = SessionState::Loading;
        }
        record_transition(SessionState::Loading);

        let receiver = self.provider.subscribe();
        self.spawn_listener(receiver).await;

        match self.provider.get_session().await {
            Ok(Some(session)) if !session.is_expired(Utc::now()) => {
                self.establish(session, Refetch::IfChanged).await;
            }
            Ok(_) => self.settle_anonymous().await,
            Err(e) => {
                warn!(error = %e, "failed to fetch current session; continuing anonymously");
                self.settle_anonymous().await;
            }
        }
    }

    /// Release the provider subscription and forget the identity
    pub async fn teardown(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
        self.clear(SessionState::Uninitialized).await;
        debug!("auth context torn down");
    }

    /// Apply one provider event
    pub async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => self.establish(session, Refetch::Always).await,
            AuthEvent::SignedOut => self.clear(SessionState::Anonymous).await,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<IdentitySession> {
        let session = self.provider.sign_in(email, password).await?;
        self.establish(session.clone(), Refetch::Always).await;
        // The listener may have started a newer fetch for the same sign-in
        self.profile_settled().await;
        Ok(session)
    }

    pub async fn sign_up(&self, input: &SignUpInput) -> Result<Uuid> {
        input.validate()?;
        self.provider.sign_up(input).await
    }

    /// Sign out through the provider.
    ///
    /// On failure the error is returned for the caller to report and the
    /// local state is left as it was.
    pub async fn sign_out(&self) -> Result<()> {
        match self.provider.sign_out().await {
            Ok(()) => {
                self.clear(SessionState::Anonymous).await;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "sign-out failed");
                Err(e)
            }
        }
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    /// True until the initial session has been resolved
    pub async fn is_loading(&self) -> bool {
        matches!(
            self.state().await,
            SessionState::Uninitialized | SessionState::Loading
        )
    }

    pub async fn session(&self) -> Option<IdentitySession> {
        self.inner.read().await.session.clone()
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.inner.read().await.profile.clone()
    }

    /// Role of the current identity; `viewer` unless a profile is loaded
    pub async fn user_role(&self) -> Role {
        let inner = self.inner.read().await;
        match (inner.state, inner.profile.as_ref()) {
            (SessionState::Authenticated, Some(profile)) => profile.role,
            _ => Role::Viewer,
        }
    }

    /// Authorization subject; anonymous while loading
    pub async fn subject(&self) -> Subject {
        let inner = self.inner.read().await;
        match inner.state {
            SessionState::Authenticated => Subject::authenticated(inner.profile.as_ref()),
            _ => Subject::anonymous(),
        }
    }

    pub async fn snapshot(&self) -> AuthSnapshot {
        let inner = self.inner.read().await;
        let role = match (inner.state, inner.profile.as_ref()) {
            (SessionState::Authenticated, Some(profile)) => profile.role,
            _ => Role::Viewer,
        };
        AuthSnapshot {
            state: inner.state,
            user_id: inner.session.as_ref().map(|s| s.user_id),
            email: inner.session.as_ref().and_then(|s| s.email.clone()),
            profile: inner.profile.clone(),
            role,
        }
    }

    /// Whether the provider subscription is still being consumed
    pub async fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn spawn_listener(&self, mut receiver: broadcast::Receiver<AuthEvent>) {
        let ctx = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => ctx.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth event subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("auth event stream closed");
        });

        if let Some(previous) = self.listener.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Enter `Authenticated` for `session` and load its profile.
    ///
    /// The current profile stays in place until the new fetch lands, unless the
    /// session belongs to a different user.
    async fn establish(&self, session: IdentitySession, refetch: Refetch) {
        let token = {
            let mut inner = self.inner.write().await;
            let unchanged = refetch == Refetch::IfChanged
                && inner.state == SessionState::Authenticated
                && inner
                    .session
                    .as_ref()
                    .is_some_and(|s| s.access_token == session.access_token);
            if unchanged {
                return;
            }

            if inner.session.as_ref().map(|s| s.user_id) != Some(session.user_id) {
                inner.profile = None;
            }
            inner.state = SessionState::Authenticated;
            inner.session = Some(session.clone());
            let token = self.next_fetch_token();
            inner.latest_fetch = token;
            token
        };
        record_transition(SessionState::Authenticated);
        info!(user_id = %session.user_id, "identity established");

        self.fetch_profile(&session, token).await;
    }

    async fn fetch_profile(&self, session: &IdentitySession, token: u64) {
        let result = self
            .profiles
            .find_by_user_id(&session.access_token, session.user_id)
            .await;

        let mut inner = self.inner.write().await;
        if inner.latest_fetch != token {
            debug!(user_id = %session.user_id, "discarding stale profile response");
            return;
        }

        match result {
            Ok(Some(profile)) => {
                debug!(user_id = %session.user_id, role = %profile.role, "profile loaded");
                inner.profile = Some(profile);
            }
            Ok(None) => {
                warn!(user_id = %session.user_id, "profile not found; falling back to viewer");
                metrics::counter!("semula_profile_fetch_failures_total", "reason" => "not_found")
                    .increment(1);
                inner.profile = None;
            }
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "profile fetch failed; falling back to viewer");
                metrics::counter!("semula_profile_fetch_failures_total", "reason" => "error")
                    .increment(1);
                inner.profile = None;
            }
        }
        self.settled.send_replace(token);
    }

    async fn settle_anonymous(&self) {
        let mut inner = self.inner.write().await;
        // A SignedIn event may have won the race while the session was fetched
        if inner.state == SessionState::Loading {
            inner.state = SessionState::Anonymous;
            drop(inner);
            record_transition(SessionState::Anonymous);
        }
    }

    async fn clear(&self, state: SessionState) {
        {
            let mut inner = self.inner.write().await;
            inner.state = state;
            inner.session = None;
            inner.profile = None;
            inner.latest_fetch = self.next_fetch_token();
            self.settled.send_replace(inner.latest_fetch);
        }
        record_transition(state);
    }

    /// Wait until the newest profile fetch has been applied or invalidated
    async fn profile_settled(&self) {
        let mut settled = self.settled.subscribe();
        loop {
            let latest = self.inner.read().await.latest_fetch;
            if *settled.borrow_and_update() >= latest {
                return;
            }
            if settled.changed().await.is_err() {
                return;
            }
        }
    }

    fn next_fetch_token(&self) -> u64 {
        self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Whether a `SignedIn` for the current session fetches the profile again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refetch {
    Always,
    IfChanged,
}

fn record_transition(state: SessionState) {
    metrics::counter!("semula_session_transitions_total", "to" => state.as_str()).increment(1);
}
