// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Privileged email confirmation endpoint.
//!
//! Mounted behind [`crate::middleware::require_internal`]; only trusted
//! callers holding the internal token reach these handlers.

use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::services::{confirm_user_email, ConfirmError};
use crate::AppState;

pub const CONFIRM_USER_PATH: &str = "/api/confirm-user";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(CONFIRM_USER_PATH, post(confirm_user))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmUserRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmUserResponse {
    pub success: bool,
}

/// Force-confirm the account registered under `email`.
async fn confirm_user(
    State(state): State<Arc<AppState>>,
    WithRejection(Json(req), _): WithRejection<Json<ConfirmUserRequest>, AppError>,
) -> Result<Json<ConfirmUserResponse>> {
    let email = req
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or(ConfirmError::MissingEmail)?;

    let admin = state.admin.as_ref().ok_or(ConfirmError::NotConfigured)?;
    confirm_user_email(admin.as_ref(), &email).await?;

    Ok(Json(ConfirmUserResponse { success: true }))
}
