// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed-in routes: profile, dashboard and settings.

use axum::{extract::State, routing::get, Json, Router};
use axum_extra::extract::WithRejection;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::SignedIn;
use crate::models::profile::display_name;
use crate::models::{Profile, ProfileChanges};
use crate::routes::auth::UserResponse;
use crate::services::{profile::apply_changes, ProfileLookup, ProfileResolver};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/dashboard", get(dashboard))
        .route("/settings", get(settings))
}

/// Get the caller's profile, creating the default row on first access.
///
/// A lookup failure is reported in the body rather than failing the request.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    SignedIn(session): SignedIn,
) -> Json<ProfileLookup> {
    let resolver = ProfileResolver::new(state.profiles.clone());
    Json(resolver.resolve(Some(&session)).await)
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    SignedIn(session): SignedIn,
    WithRejection(Json(changes), _): WithRejection<Json<ProfileChanges>, AppError>,
) -> Result<Json<Profile>> {
    if changes.is_empty() {
        return Err(AppError::BadRequest("No profile fields to update".to_string()));
    }

    let profile = apply_changes(state.profiles.as_ref(), Some(&session), changes).await?;
    tracing::info!(user_id = %session.user.id, "Profile updated");
    Ok(Json(profile))
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: UserResponse,
    pub profile: Option<Profile>,
    pub display_name: String,
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    SignedIn(session): SignedIn,
) -> Json<DashboardResponse> {
    let resolver = ProfileResolver::new(state.profiles.clone());
    let lookup = resolver.resolve(Some(&session)).await;

    Json(DashboardResponse {
        user: UserResponse::from(&session.user),
        display_name: display_name(&session.user, lookup.profile.as_ref()),
        profile: lookup.profile,
    })
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub user: UserResponse,
    pub profile: ProfileLookup,
}

/// Account settings: the editable profile fields plus the account they belong to.
async fn settings(
    State(state): State<Arc<AppState>>,
    SignedIn(session): SignedIn,
) -> Json<SettingsResponse> {
    let profile = ProfileResolver::new(state.profiles.clone())
        .resolve(Some(&session))
        .await;

    Json(SettingsResponse {
        user: UserResponse::from(&session.user),
        profile,
    })
}
