// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process profile store.
//!
//! Mirrors the table's unique primary key: a second insert for the same user
//! ID fails with [`StoreError::Conflict`]. Used for tests and for running the
//! gateway locally without a database.

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

use crate::db::{ProfileStore, StoreError};
use crate::models::{Profile, ProfileChanges, Session};

#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    rows: Arc<DashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Read a row without going through a session.
    pub fn get(&self, user_id: &str) -> Option<Profile> {
        self.rows.get(user_id).map(|row| row.clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn fetch(
        &self,
        _session: &Session,
        user_id: &str,
    ) -> Result<Option<Profile>, StoreError> {
        Ok(self.get(user_id))
    }

    async fn insert(&self, _session: &Session, profile: &Profile) -> Result<Profile, StoreError> {
        match self.rows.entry(profile.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                Ok(profile.clone())
            }
        }
    }

    async fn update(
        &self,
        _session: &Session,
        user_id: &str,
        changes: &ProfileChanges,
    ) -> Result<Profile, StoreError> {
        let mut row = self.rows.get_mut(user_id).ok_or_else(|| StoreError::Rejected {
            status: 404,
            message: "Profile not found".to_string(),
        })?;
        changes.apply_to(&mut row);
        Ok(row.clone())
    }
}
