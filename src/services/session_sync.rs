// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mirrors an [`AuthClient`]'s session into observable local state.
//!
//! On start the synchronizer subscribes to the client's change events, reads
//! the current session once, then applies every event in arrival order. The
//! subscription lives exactly as long as the synchronizer.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::models::{Session, User};
use crate::services::auth_client::{AuthClient, AuthEvent};

/// Locally observed authentication state.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    /// True until the initial session read or the first event lands.
    pub loading: bool,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            session: None,
            loading: true,
        }
    }

    fn settled(session: Option<Session>) -> Self {
        Self {
            session,
            loading: false,
        }
    }

    /// The signed-in user, derived from the session.
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

/// Owner of the one event subscription for a client.
pub struct SessionSynchronizer {
    state: watch::Receiver<AuthSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl SessionSynchronizer {
    /// Subscribe to `client` and start mirroring its session.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(client: Arc<AuthClient>) -> Self {
        let (tx, rx) = watch::channel(AuthSnapshot::initial());
        // Subscribe before the initial read so nothing emitted in between is lost.
        let events = client.subscribe();
        let task = tokio::spawn(run(client, tx, events));

        Self {
            state: rx,
            task: Some(task),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Watch handle for observers that want change notifications.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.clone()
    }

    /// Wait until the initial session has been resolved.
    pub async fn loaded(&self) -> AuthSnapshot {
        let mut state = self.state.clone();
        let snapshot = match state.wait_for(|s| !s.loading).await {
            Ok(snapshot) => snapshot.clone(),
            // The task is gone; report whatever was last published.
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    /// Stop mirroring and release the subscription.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for SessionSynchronizer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    client: Arc<AuthClient>,
    state: watch::Sender<AuthSnapshot>,
    mut events: broadcast::Receiver<AuthEvent>,
) {
    match client.get_session().await {
        Ok(session) => {
            state.send_replace(AuthSnapshot::settled(session));
        }
        Err(err) => {
            tracing::error!(error = ?err, "Error getting initial session");
            state.send_modify(|s| s.loading = false);
        }
    }

    // Events buffered during the initial read are newer than it, so applying
    // them in order keeps last-write-wins.
    loop {
        match events.recv().await {
            Ok(event) => {
                tracing::debug!(
                    kind = ?event.kind,
                    user_id = ?event.session.as_ref().map(|s| s.user.id.as_str()),
                    "Auth state changed"
                );
                state.send_replace(AuthSnapshot::settled(event.session));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Auth events lagged, resynchronizing");
                let session = client.current_session().await;
                state.send_replace(AuthSnapshot::settled(session));
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
