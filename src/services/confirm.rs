// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Privileged email confirmation.
//!
//! Force-marks an account's email as confirmed, bypassing verification.
//! This needs the service key, so it only runs behind the trusted server
//! boundary: either in-process through [`AdminConfirmer`], or over HTTP to
//! the internal-token-protected endpoint through [`ConfirmEndpointClient`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::AppError;
use crate::services::identity::{IdentityAdmin, IdentityError};

/// Confirmation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfirmError {
    #[error("Email is required")]
    MissingEmail,

    #[error("User not found")]
    UserNotFound,

    #[error("SUPABASE_SERVICE_ROLE_KEY is required for admin operations")]
    NotConfigured,

    /// The identity service refused; its message is passed through.
    #[error("{0}")]
    Rejected(String),

    #[error("Failed to confirm email")]
    Unexpected(String),

    #[error("Network error occurred")]
    Network(String),
}

impl From<ConfirmError> for AppError {
    fn from(err: ConfirmError) -> Self {
        match err {
            ConfirmError::MissingEmail => AppError::BadRequest(err.to_string()),
            other => AppError::Confirmation(other.to_string()),
        }
    }
}

/// Anything that can force-confirm an account by email.
#[async_trait]
pub trait EmailConfirmer: Send + Sync {
    async fn confirm_email(&self, email: &str) -> Result<(), ConfirmError>;
}

/// Look the account up by email and mark it confirmed.
pub async fn confirm_user_email(
    admin: &dyn IdentityAdmin,
    email: &str,
) -> Result<(), ConfirmError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ConfirmError::MissingEmail);
    }

    let user = match admin.find_user_by_email(email).await {
        Ok(Some(user)) => user,
        Ok(None) | Err(IdentityError::UserNotFound) => return Err(ConfirmError::UserNotFound),
        Err(IdentityError::Transport(detail)) => {
            tracing::error!(error = %detail, "Error looking up user for confirmation");
            return Err(ConfirmError::Unexpected(detail));
        }
        Err(err) => {
            tracing::warn!(error = %err, "User lookup rejected");
            return Err(ConfirmError::UserNotFound);
        }
    };

    match admin.confirm_email(&user.id).await {
        Ok(()) => {
            tracing::info!(user_id = %user.id, "Email force-confirmed");
            Ok(())
        }
        Err(IdentityError::Transport(detail)) => {
            tracing::error!(user_id = %user.id, error = %detail, "Error confirming user email");
            Err(ConfirmError::Unexpected(detail))
        }
        Err(err) => Err(ConfirmError::Rejected(err.to_string())),
    }
}

/// In-process confirmer holding the admin capability.
pub struct AdminConfirmer {
    admin: Arc<dyn IdentityAdmin>,
}

impl AdminConfirmer {
    pub fn new(admin: Arc<dyn IdentityAdmin>) -> Self {
        Self { admin }
    }
}

#[async_trait]
impl EmailConfirmer for AdminConfirmer {
    async fn confirm_email(&self, email: &str) -> Result<(), ConfirmError> {
        confirm_user_email(self.admin.as_ref(), email).await
    }
}

/// Calls `POST /api/confirm-user` on a gateway, presenting the internal token.
#[derive(Clone)]
pub struct ConfirmEndpointClient {
    http: reqwest::Client,
    endpoint: String,
    internal_token: String,
}

impl ConfirmEndpointClient {
    pub fn new(gateway_url: &str, internal_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/confirm-user", gateway_url.trim_end_matches('/')),
            internal_token: internal_token.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct EndpointError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[async_trait]
impl EmailConfirmer for ConfirmEndpointClient {
    async fn confirm_email(&self, email: &str) -> Result<(), ConfirmError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.internal_token)
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(|e| ConfirmError::Network(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let body: Option<EndpointError> = response.json().await.ok();
        let message = body
            .and_then(|b| b.details.or(b.error))
            .unwrap_or_else(|| "Failed to confirm email".to_string());
        Err(ConfirmError::Rejected(message))
    }
}
