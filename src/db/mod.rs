// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile storage layer.

pub mod memory;
pub mod postgrest;

pub use memory::MemoryProfileStore;
pub use postgrest::PostgrestProfiles;

use async_trait::async_trait;

use crate::error::UNEXPECTED_ERROR;
use crate::models::{Profile, ProfileChanges, Session};

/// Table names as constants.
pub mod tables {
    pub const PROFILES: &str = "profiles";
}

/// Profile store error categories.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A row with the same key already exists.
    #[error("Profile already exists")]
    Conflict,

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{}", UNEXPECTED_ERROR)]
    Transport(String),
}

/// Keyed record store holding one profile per user ID.
///
/// Every call is made on behalf of a signed-in session; stores that enforce
/// row-level security authorize with the session's access token.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Point lookup. `Ok(None)` means no row exists.
    async fn fetch(&self, session: &Session, user_id: &str)
        -> Result<Option<Profile>, StoreError>;

    /// Insert a new row, failing with [`StoreError::Conflict`] if one exists.
    async fn insert(&self, session: &Session, profile: &Profile) -> Result<Profile, StoreError>;

    /// Partial update keyed by user ID, returning the stored row.
    async fn update(
        &self,
        session: &Session,
        user_id: &str,
        changes: &ProfileChanges,
    ) -> Result<Profile, StoreError>;
}
