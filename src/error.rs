// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::StoreError;
use crate::services::IdentityError;

/// Message shown for transport failures so callers never see a raw error.
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Identity service error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Email confirmation failed: {0}")]
    Confirmation(String),

    #[error("Profile store error: {0}")]
    ProfileStore(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Identity(IdentityError::Transport(msg)) => {
                tracing::error!(error = %msg, "Identity service unreachable");
                (
                    StatusCode::BAD_GATEWAY,
                    "identity_unavailable",
                    Some(UNEXPECTED_ERROR.to_string()),
                )
            }
            AppError::Identity(IdentityError::EmailNotConfirmed) => (
                StatusCode::UNAUTHORIZED,
                "email_not_confirmed",
                Some(IdentityError::EmailNotConfirmed.to_string()),
            ),
            AppError::Identity(err) => {
                (StatusCode::UNAUTHORIZED, "auth_error", Some(err.to_string()))
            }
            AppError::Confirmation(msg) => {
                tracing::warn!(error = %msg, "Email confirmation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "confirmation_failed",
                    Some(msg.clone()),
                )
            }
            AppError::ProfileStore(err) => {
                tracing::error!(error = %err, "Profile store error");
                (StatusCode::BAD_GATEWAY, "profile_error", Some(err.to_string()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
