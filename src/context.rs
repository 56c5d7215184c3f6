// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Owned authentication context for a single caller.
//!
//! An [`AuthContext`] bundles one [`AuthClient`], the [`SessionSynchronizer`]
//! mirroring it, the [`CredentialFlow`] acting through it and a
//! [`ProfileResolver`] that follows the signed-in user. It is created with
//! [`AuthContext::start`] and released with [`AuthContext::shutdown`];
//! dropping it also stops its background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::ProfileStore;
use crate::models::profile::display_name;
use crate::models::{Profile, ProfileChanges, Session, User};
use crate::services::{
    sign_in_with_recovery, AuthClient, AuthSnapshot, CredentialFlow, EmailConfirmer,
    IdentityApi, IdentityError, OAuthProvider, OAuthRedirect, ProfileError, ProfileLookup,
    ProfileResolver, SessionSynchronizer, SignUpOutcome,
};

/// Settings an [`AuthContext`] needs beyond its service handles.
#[derive(Clone)]
pub struct ContextOptions {
    pub callback_url: String,
    pub retry_delay: Duration,
    /// Used to recover from an unconfirmed email at sign-in.
    pub confirmer: Option<Arc<dyn EmailConfirmer>>,
}

impl ContextOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            callback_url: config.oauth_callback_url(),
            retry_delay: config.confirm_retry_delay,
            confirmer: None,
        }
    }

    pub fn with_confirmer(mut self, confirmer: Arc<dyn EmailConfirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }
}

pub struct AuthContext {
    client: Arc<AuthClient>,
    sync: SessionSynchronizer,
    flow: CredentialFlow,
    resolver: Arc<ProfileResolver>,
    follower: ProfileFollower,
    confirmer: Option<Arc<dyn EmailConfirmer>>,
    retry_delay: Duration,
}

impl AuthContext {
    /// Start a context with no session. Must be called inside a Tokio runtime.
    pub fn start(
        identity: Arc<dyn IdentityApi>,
        store: Arc<dyn ProfileStore>,
        options: ContextOptions,
    ) -> Self {
        Self::start_with_client(Arc::new(AuthClient::new(identity)), store, options)
    }

    /// Start a context around an existing client, e.g. one resuming a session.
    pub fn start_with_client(
        client: Arc<AuthClient>,
        store: Arc<dyn ProfileStore>,
        options: ContextOptions,
    ) -> Self {
        let sync = SessionSynchronizer::start(client.clone());
        let resolver = Arc::new(ProfileResolver::new(store.clone()));
        let follower = ProfileFollower::start(sync.subscribe(), resolver.clone());
        let flow = CredentialFlow::new(client.clone(), store, options.callback_url);

        Self {
            client,
            sync,
            flow,
            resolver,
            follower,
            confirmer: options.confirmer,
            retry_delay: options.retry_delay,
        }
    }

    pub fn client(&self) -> &Arc<AuthClient> {
        &self.client
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.sync.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.sync.subscribe()
    }

    /// Wait for the initial session read to finish.
    pub async fn loaded(&self) -> AuthSnapshot {
        self.sync.loaded().await
    }

    pub fn loading(&self) -> bool {
        self.sync.snapshot().loading
    }

    pub fn session(&self) -> Option<Session> {
        self.sync.snapshot().session
    }

    pub fn user(&self) -> Option<User> {
        self.sync.snapshot().user().cloned()
    }

    /// The cached profile of the signed-in user.
    pub async fn profile(&self) -> Option<Profile> {
        self.resolver.profile().await
    }

    /// Re-resolve the profile for the current session.
    pub async fn refresh_profile(&self) -> ProfileLookup {
        self.resolver.resolve(self.session().as_ref()).await
    }

    pub async fn update_profile(&self, changes: ProfileChanges) -> Result<Profile, ProfileError> {
        self.resolver
            .update_profile(self.session().as_ref(), changes)
            .await
    }

    /// Name to greet the signed-in user with.
    pub async fn display_name(&self) -> Option<String> {
        let user = self.user()?;
        let profile = self.profile().await;
        Some(display_name(&user, profile.as_ref()))
    }

    /// Adopt a session obtained elsewhere.
    pub async fn set_session(&self, session: Session) {
        self.client.set_session(session).await;
    }

    /// Password sign-in, force-confirming once if the email is unconfirmed
    /// and a confirmer is configured.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), IdentityError> {
        sign_in_with_recovery(
            &self.flow,
            self.confirmer.as_deref(),
            email,
            password,
            self.retry_delay,
        )
        .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpOutcome, IdentityError> {
        self.flow.sign_up(email, password, username).await
    }

    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        self.flow.sign_out().await
    }

    pub fn sign_in_with_oauth(&self, provider: OAuthProvider) -> anyhow::Result<OAuthRedirect> {
        self.flow.sign_in_with_oauth(provider)
    }

    pub async fn complete_oauth(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, IdentityError> {
        self.flow.complete_oauth(auth_code, code_verifier).await
    }

    /// Stop the background tasks and release the client subscription.
    pub async fn shutdown(self) {
        let AuthContext { sync, follower, .. } = self;
        follower.stop().await;
        sync.shutdown().await;
    }
}

/// Re-resolves the profile whenever the signed-in user changes.
struct ProfileFollower {
    task: Option<JoinHandle<()>>,
}

impl ProfileFollower {
    fn start(state: watch::Receiver<AuthSnapshot>, resolver: Arc<ProfileResolver>) -> Self {
        Self {
            task: Some(tokio::spawn(follow_user(state, resolver))),
        }
    }

    async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for ProfileFollower {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn follow_user(mut state: watch::Receiver<AuthSnapshot>, resolver: Arc<ProfileResolver>) {
    let mut current: Option<String> = None;

    loop {
        let snapshot = state.borrow_and_update().clone();
        if !snapshot.loading {
            let user_id = snapshot.user().map(|u| u.id.clone());
            if user_id != current {
                current = user_id;
                resolver.resolve(snapshot.session.as_ref()).await;
            }
        }

        if state.changed().await.is_err() {
            break;
        }
    }
}
