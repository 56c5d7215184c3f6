// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route guard run on every non-asset request.
//!
//! Anonymous requests to protected paths go to the sign-in page with a
//! return target; signed-in requests to the auth pages go home. Everything
//! else passes through with whatever cookie changes session restoration made.
//! An internal failure never blocks a request.

use crate::cookies::ACCESS_TOKEN_COOKIE;
use crate::middleware::auth::{restore_session, CurrentSession};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

pub const SIGN_IN_PATH: &str = "/login";
pub const SIGN_UP_PATH: &str = "/signup";
pub const HOME_PATH: &str = "/";
/// Query parameter carrying the originally requested path.
pub const RETURN_TARGET_PARAM: &str = "redirectTo";

const ASSET_PREFIXES: &[&str] = &["/static/", "/assets/", "/_image/", "/favicon.ico"];
const IMAGE_EXTENSIONS: &[&str] = &[".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// What the guard does with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Continue,
    RedirectToSignIn { return_to: String },
    RedirectHome,
}

/// Static assets and images skip the guard entirely.
pub fn is_static_asset(path: &str) -> bool {
    if ASSET_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    let lower = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn is_auth_only(path: &str) -> bool {
    path == SIGN_IN_PATH || path == SIGN_UP_PATH
}

pub fn is_protected(path: &str, protected_paths: &[String]) -> bool {
    protected_paths
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
}

/// Decide a request's fate from its path and whether it has a valid session.
pub fn decide(path: &str, signed_in: bool, protected_paths: &[String]) -> GuardDecision {
    if !signed_in && is_protected(path, protected_paths) {
        return GuardDecision::RedirectToSignIn {
            return_to: path.to_string(),
        };
    }
    if signed_in && is_auth_only(path) {
        return GuardDecision::RedirectHome;
    }
    GuardDecision::Continue
}

/// `/login?redirectTo=<path>`
pub fn sign_in_location(return_to: &str) -> String {
    format!(
        "{}?{}={}",
        SIGN_IN_PATH,
        RETURN_TARGET_PARAM,
        urlencoding::encode(return_to)
    )
}

/// Middleware enforcing session requirements per path.
pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_static_asset(&path) {
        return next.run(request).await;
    }

    let restored = match restore_session(&state, jar).await {
        Ok(restored) => restored,
        Err(e) => {
            tracing::error!(error = %e, path = %path, "Route guard error, passing request through");
            return next.run(request).await;
        }
    };

    match decide(
        &path,
        restored.session.is_some(),
        &state.config.protected_paths,
    ) {
        GuardDecision::RedirectToSignIn { return_to } => {
            tracing::debug!(path = %path, "Anonymous request to protected path");
            (restored.jar, Redirect::temporary(&sign_in_location(&return_to))).into_response()
        }
        GuardDecision::RedirectHome => {
            (restored.jar, Redirect::temporary(HOME_PATH)).into_response()
        }
        GuardDecision::Continue => {
            if let Some(session) = restored.session {
                request.extensions_mut().insert(CurrentSession(session));
            }
            let response = next.run(request).await;
            if sets_session_cookie(&response) {
                return response;
            }
            (restored.jar, response).into_response()
        }
    }
}

/// Whether a handler already wrote (or removed) the session cookies itself.
fn sets_session_cookie(response: &Response) -> bool {
    let prefix = format!("{}=", ACCESS_TOKEN_COOKIE);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}
