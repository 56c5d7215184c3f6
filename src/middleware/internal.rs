// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Internal-caller authentication middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Require `Authorization: Bearer <INTERNAL_API_TOKEN>` for privileged routes.
///
/// With no token configured the routes are closed to everyone.
pub async fn require_internal(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.config.internal_api_token.as_deref() else {
        tracing::warn!("Blocked privileged request: INTERNAL_API_TOKEN not configured");
        return Err(StatusCode::FORBIDDEN);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let authorized = presented
        .map(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())))
        .unwrap_or(false);

    if !authorized {
        tracing::warn!(
            path = %request.uri().path(),
            has_credentials = presented.is_some(),
            "Blocked privileged request with invalid internal token"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
