// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile model stored in the `profiles` table.

use serde::{Deserialize, Serialize};

use crate::models::User;

/// Fallback display name when nothing else is known about a user.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Display metadata for a user, one row per user ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// User ID (primary key, references the identity service user)
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Last update (RFC 3339)
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Profile {
    /// Default row synthesized for a user that has no profile yet.
    pub fn default_for(user: &User, updated_at: String) -> Self {
        let display_name = default_display_name(user);
        Self {
            id: user.id.clone(),
            username: Some(display_name.clone()),
            full_name: Some(display_name),
            avatar_url: None,
            updated_at: Some(updated_at),
        }
    }
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Stamped by the resolver, never taken from callers.
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.full_name.is_none() && self.avatar_url.is_none()
    }

    /// Apply these changes to an existing row.
    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(username) = &self.username {
            profile.username = Some(username.clone());
        }
        if let Some(full_name) = &self.full_name {
            profile.full_name = Some(full_name.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        if let Some(updated_at) = &self.updated_at {
            profile.updated_at = Some(updated_at.clone());
        }
    }
}

/// Name used when creating a profile from identity metadata:
/// username, then display name, then full name, then the email's local part.
pub fn default_display_name(user: &User) -> String {
    user.metadata_str("username")
        .or_else(|| user.metadata_str("display_name"))
        .or_else(|| user.metadata_str("full_name"))
        .or_else(|| user.email_local_part())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string()
}

/// Name shown in navigation and on the dashboard. Prefers what the user put
/// in their profile over identity metadata.
pub fn display_name(user: &User, profile: Option<&Profile>) -> String {
    let from_profile = profile.and_then(|p| {
        non_blank(p.full_name.as_deref()).or_else(|| non_blank(p.username.as_deref()))
    });

    from_profile
        .or_else(|| user.metadata_str("username"))
        .or_else(|| user.metadata_str("display_name"))
        .or_else(|| user.email_local_part())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
