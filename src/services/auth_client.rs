// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stateful identity client.
//!
//! Holds the current session for one caller and broadcasts a change event
//! whenever it is replaced. The identity service serializes its own session
//! transitions; this client only mirrors the latest one it was told about.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::models::Session;
use crate::services::identity::{IdentityApi, IdentityError, OAuthProvider, SignUpOutcome};
use serde_json::{Map, Value};

/// Refresh an access token this many seconds before it actually expires.
pub const REFRESH_LEEWAY_SECS: i64 = 30;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Why the session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Session change notification.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

/// Identity client bound to a single caller's session.
pub struct AuthClient {
    identity: Arc<dyn IdentityApi>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthClient {
    /// Client with no session.
    pub fn new(identity: Arc<dyn IdentityApi>) -> Self {
        Self::with_session(identity, None)
    }

    /// Client resuming a previously stored session.
    pub fn with_session(identity: Arc<dyn IdentityApi>, session: Option<Session>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            identity,
            current: RwLock::new(session),
            events,
        }
    }

    pub fn identity(&self) -> &Arc<dyn IdentityApi> {
        &self.identity
    }

    /// Subscribe to session change events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Number of live event subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// The cached session, without refreshing.
    pub async fn current_session(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// The current session, refreshed first if its access token has expired.
    ///
    /// A rejected refresh signs the caller out locally and yields `None`.
    pub async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        let now = chrono::Utc::now().timestamp();

        let mut current = self.current.write().await;
        let refresh_token = match current.as_ref() {
            None => return Ok(None),
            Some(session) if !session.is_expired(now, REFRESH_LEEWAY_SECS) => {
                return Ok(Some(session.clone()))
            }
            Some(session) => session.refresh_token.clone(),
        };

        match self.identity.refresh_session(&refresh_token).await {
            Ok(session) => {
                *current = Some(session.clone());
                self.emit(AuthEventKind::TokenRefreshed, Some(session.clone()));
                drop(current);
                tracing::debug!(user_id = %session.user.id, "Access token refreshed");
                Ok(Some(session))
            }
            Err(IdentityError::Rejected { status, message }) => {
                *current = None;
                self.emit(AuthEventKind::SignedOut, None);
                drop(current);
                tracing::info!(status, error = %message, "Refresh token rejected, signing out");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Adopt a session obtained elsewhere, such as one restored from cookies.
    pub async fn set_session(&self, session: Session) {
        self.replace(AuthEventKind::InitialSession, Some(session))
            .await;
    }

    /// Password sign-in. On success the new session is cached and announced.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let session = self.identity.sign_in_with_password(email, password).await?;
        self.replace(AuthEventKind::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    /// Register an account. A session, if the service issued one, is cached.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<SignUpOutcome, IdentityError> {
        let outcome = self.identity.sign_up(email, password, metadata).await?;
        if let Some(session) = &outcome.session {
            self.replace(AuthEventKind::SignedIn, Some(session.clone()))
                .await;
        }
        Ok(outcome)
    }

    /// Revoke the session remotely and drop it locally, whatever the outcome.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        let previous = {
            let mut current = self.current.write().await;
            let previous = current.take();
            if previous.is_some() {
                self.emit(AuthEventKind::SignedOut, None);
            }
            previous
        };

        match &previous {
            Some(session) => self.identity.sign_out(&session.access_token).await,
            None => Ok(()),
        }
    }

    /// Authorize URL for an OAuth provider.
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        self.identity
            .authorize_url(provider, redirect_to, code_challenge)
    }

    /// Finish an OAuth handshake and cache the resulting session.
    pub async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, IdentityError> {
        let session = self.identity.exchange_code(auth_code, code_verifier).await?;
        self.replace(AuthEventKind::SignedIn, Some(session.clone()))
            .await;
        Ok(session)
    }

    async fn replace(&self, kind: AuthEventKind, session: Option<Session>) {
        let mut current = self.current.write().await;
        *current = session.clone();
        self.emit(kind, session);
    }

    /// Callers hold the write guard so events go out in write order.
    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        // No subscribers is fine.
        let _ = self.events.send(AuthEvent { kind, session });
    }
}
