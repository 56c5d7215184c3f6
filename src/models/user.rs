// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity service user and session models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Account record owned by the identity service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Identity service user ID (UUID string)
    pub id: String,
    /// Email address (absent for some OAuth providers)
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata (username, display_name, full_name)
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
    /// When the email was confirmed (ISO 8601), if ever
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl User {
    /// Read a non-empty string entry from the user's metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The part of the email before the `@`, if there is one.
    pub fn email_local_part(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Proof of authentication issued by the identity service.
///
/// A session always carries its user, so "signed in" and "has a user"
/// cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Absolute expiry (Unix timestamp, seconds)
    pub expires_at: i64,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Whether the access token is past (or within `leeway_secs` of) expiry.
    pub fn is_expired(&self, now: i64, leeway_secs: i64) -> bool {
        self.expires_at <= now + leeway_secs
    }
}
