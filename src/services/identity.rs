// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Contract of the external identity service.
//!
//! The identity service owns accounts, credentials, sessions and OAuth
//! handshakes. Everything here is consumed, never implemented locally.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::UNEXPECTED_ERROR;
use crate::models::{Session, User};

/// Identity service error categories.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentityError {
    /// Credentials were right but the account's email is unconfirmed.
    #[error("Email not confirmed")]
    EmailNotConfirmed,

    /// The service rejected the call; the message is passed through verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("User not found")]
    UserNotFound,

    /// The service could not be reached or answered with garbage.
    /// The detail is kept for logs only.
    #[error("{}", UNEXPECTED_ERROR)]
    Transport(String),
}

impl IdentityError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        IdentityError::Rejected {
            status,
            message: message.into(),
        }
    }
}

/// OAuth providers offered on the sign-in page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Apple,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 3] = [
        OAuthProvider::Google,
        OAuthProvider::Github,
        OAuthProvider::Apple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
            OAuthProvider::Apple => "apple",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OAuthProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unsupported OAuth provider: {}", s))
    }
}

/// Result of a sign-up the identity service accepted.
///
/// `session` is absent when the service requires email confirmation first.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: Option<User>,
    pub session: Option<Session>,
}

/// Stateless identity operations made with the publishable key.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Exchange email and password for a session.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError>;

    /// Register an account with the given user metadata.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<SignUpOutcome, IdentityError>;

    /// Revoke the session the access token belongs to.
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    /// Trade a refresh token for a fresh session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError>;

    /// Look up the user an access token was issued to.
    async fn get_user(&self, access_token: &str) -> Result<User, IdentityError>;

    /// URL that starts the provider's redirect handshake (PKCE, S256).
    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String;

    /// Complete a PKCE handshake.
    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, IdentityError>;
}

/// Privileged operations that need the service key.
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, IdentityError>;

    /// Mark the user's email confirmed without the verification step.
    async fn confirm_email(&self, user_id: &str) -> Result<(), IdentityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing_is_closed() {
        assert_eq!("google".parse::<OAuthProvider>(), Ok(OAuthProvider::Google));
        assert_eq!("GitHub".parse::<OAuthProvider>(), Ok(OAuthProvider::Github));
        assert!("azure".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn test_transport_error_hides_detail() {
        let err = IdentityError::Transport("connection refused (os error 111)".to_string());
        assert_eq!(err.to_string(), UNEXPECTED_ERROR);
    }
}
