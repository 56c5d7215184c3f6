// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential flows: password sign-in and sign-up, sign-out, OAuth.
//!
//! True session state lives in the identity service. Each operation here
//! delegates to it through an [`AuthClient`] and leaves session changes to
//! be observed through the client's events.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::db::ProfileStore;
use crate::models::{Profile, Session};
use crate::services::auth_client::AuthClient;
use crate::services::identity::{IdentityError, OAuthProvider, SignUpOutcome};
use crate::services::pkce::PkcePair;
use crate::time_utils::now_rfc3339;

/// Where to send the browser to start an OAuth handshake.
#[derive(Debug, Clone)]
pub struct OAuthRedirect {
    pub url: String,
    /// Must be presented again when the callback is exchanged.
    pub code_verifier: String,
}

pub struct CredentialFlow {
    client: Arc<AuthClient>,
    profiles: Arc<dyn ProfileStore>,
    callback_url: String,
}

impl CredentialFlow {
    pub fn new(
        client: Arc<AuthClient>,
        profiles: Arc<dyn ProfileStore>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            profiles,
            callback_url: callback_url.into(),
        }
    }

    pub fn client(&self) -> &Arc<AuthClient> {
        &self.client
    }

    /// Password sign-in. The identity service's error is returned verbatim.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), IdentityError> {
        self.client.sign_in_with_password(email, password).await?;
        Ok(())
    }

    /// Register an account, then best-effort create its profile.
    ///
    /// Success is decided by the identity service alone; a failed profile
    /// insert is logged and left for lazy creation on first access.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpOutcome, IdentityError> {
        let display_name = sign_up_display_name(email, username);
        let outcome = self
            .client
            .sign_up(email, password, sign_up_metadata(&display_name))
            .await?;

        match (&outcome.user, &outcome.session) {
            (Some(user), Some(session)) => {
                let profile = Profile {
                    id: user.id.clone(),
                    username: Some(display_name.clone()),
                    full_name: Some(display_name),
                    avatar_url: None,
                    updated_at: Some(now_rfc3339()),
                };
                if let Err(e) = self.profiles.insert(session, &profile).await {
                    tracing::warn!(user_id = %user.id, error = ?e, "Profile creation failed");
                }
            }
            (Some(user), None) => {
                tracing::info!(
                    user_id = %user.id,
                    "Sign-up awaiting email confirmation, profile deferred"
                );
            }
            _ => {}
        }

        Ok(outcome)
    }

    /// Sign out. The local session is cleared even if the remote call fails.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        self.client.sign_out().await
    }

    /// Start an OAuth handshake. Only initiates; completion arrives through
    /// the callback and shows up as a session event.
    pub fn sign_in_with_oauth(&self, provider: OAuthProvider) -> anyhow::Result<OAuthRedirect> {
        let pkce = PkcePair::generate()?;
        let url = self
            .client
            .authorize_url(provider, &self.callback_url, &pkce.challenge);

        tracing::info!(provider = %provider, "Starting OAuth flow");
        Ok(OAuthRedirect {
            url,
            code_verifier: pkce.verifier,
        })
    }

    /// Exchange the callback's code for a session.
    pub async fn complete_oauth(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, IdentityError> {
        self.client
            .exchange_code_for_session(auth_code, code_verifier)
            .await
    }
}

/// Explicit username if given, otherwise the email's local part.
pub fn sign_up_display_name(email: &str, username: Option<&str>) -> String {
    username
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .or_else(|| email.split('@').next())
        .unwrap_or_default()
        .to_string()
}

/// Metadata attached to a new account.
pub fn sign_up_metadata(display_name: &str) -> Map<String, Value> {
    ["username", "display_name", "full_name"]
        .into_iter()
        .map(|key| (key.to_string(), Value::String(display_name.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_display_name() {
        assert_eq!(sign_up_display_name("ada@example.com", Some("countess")), "countess");
        assert_eq!(sign_up_display_name("ada@example.com", Some("   ")), "ada");
        assert_eq!(sign_up_display_name("ada@example.com", None), "ada");
    }

    #[test]
    fn test_sign_up_metadata_keys() {
        let metadata = sign_up_metadata("ada");
        assert_eq!(metadata.len(), 3);
        for key in ["username", "display_name", "full_name"] {
            assert_eq!(metadata[key], Value::String("ada".to_string()));
        }
    }
}
