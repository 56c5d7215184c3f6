// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile resolution: fetch the signed-in user's profile, creating a
//! default one on first access.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db::{ProfileStore, StoreError};
use crate::error::AppError;
use crate::models::{Profile, ProfileChanges, Session};
use crate::time_utils::now_rfc3339;

/// Profile operation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("No user logged in")]
    NotSignedIn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotSignedIn => AppError::Unauthorized,
            ProfileError::Store(err) => AppError::ProfileStore(err),
        }
    }
}

/// Outcome of a profile lookup. A missing profile is not a failure; the
/// error, if any, says why there is none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileLookup {
    pub profile: Option<Profile>,
    pub error: Option<String>,
}

/// Fetch the session user's profile, inserting the default row if absent.
///
/// Losing an insert race to a concurrent first access is not an error: the
/// winner's row is read back and returned.
pub async fn fetch_or_create(
    store: &dyn ProfileStore,
    session: &Session,
) -> Result<Profile, StoreError> {
    let user = &session.user;

    if let Some(profile) = store.fetch(session, &user.id).await? {
        return Ok(profile);
    }

    let default = Profile::default_for(user, now_rfc3339());
    match store.insert(session, &default).await {
        Ok(profile) => {
            tracing::info!(user_id = %user.id, "Created default profile");
            Ok(profile)
        }
        Err(StoreError::Conflict) => {
            tracing::debug!(user_id = %user.id, "Profile created concurrently, reading it back");
            store
                .fetch(session, &user.id)
                .await?
                .ok_or_else(|| StoreError::Rejected {
                    status: 409,
                    message: "Profile exists but is not readable".to_string(),
                })
        }
        Err(err) => Err(err),
    }
}

/// Apply a partial update to the session user's profile, stamping `updated_at`.
pub async fn apply_changes(
    store: &dyn ProfileStore,
    session: Option<&Session>,
    mut changes: ProfileChanges,
) -> Result<Profile, ProfileError> {
    let session = session.ok_or(ProfileError::NotSignedIn)?;
    changes.updated_at = Some(now_rfc3339());

    Ok(store.update(session, &session.user.id, &changes).await?)
}

/// Caches the profile of whoever is currently signed in.
pub struct ProfileResolver {
    store: Arc<dyn ProfileStore>,
    cached: RwLock<Option<Profile>>,
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    /// Last resolved profile.
    pub async fn profile(&self) -> Option<Profile> {
        self.cached.read().await.clone()
    }

    /// Resolve the profile for `session`, replacing the cache.
    pub async fn resolve(&self, session: Option<&Session>) -> ProfileLookup {
        let Some(session) = session else {
            *self.cached.write().await = None;
            return ProfileLookup::default();
        };

        let lookup = match fetch_or_create(self.store.as_ref(), session).await {
            Ok(profile) => ProfileLookup {
                profile: Some(profile),
                error: None,
            },
            Err(err) => {
                tracing::error!(user_id = %session.user.id, error = ?err, "Error resolving profile");
                ProfileLookup {
                    profile: None,
                    error: Some(err.to_string()),
                }
            }
        };

        *self.cached.write().await = lookup.profile.clone();
        lookup
    }

    /// Update the signed-in user's profile; on success the cache holds the
    /// row the store returned.
    pub async fn update_profile(
        &self,
        session: Option<&Session>,
        changes: ProfileChanges,
    ) -> Result<Profile, ProfileError> {
        let profile = apply_changes(self.store.as_ref(), session, changes).await?;
        *self.cached.write().await = Some(profile.clone());
        Ok(profile)
    }
}
