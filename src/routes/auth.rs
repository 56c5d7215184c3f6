// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential flow routes: password sign-in/sign-up, sign-out and OAuth.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

use crate::cookies::{
    clear_session, store_pkce_verifier, store_session, take_pkce_verifier, OAUTH_CALLBACK_PATH,
};
use crate::error::{AppError, Result};
use crate::middleware::auth::MaybeSignedIn;
use crate::middleware::guard::{HOME_PATH, SIGN_IN_PATH};
use crate::models::User;
use crate::services::{
    sign_in_with_recovery, AdminConfirmer, AuthClient, CredentialFlow, EmailConfirmer,
    OAuthProvider,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/oauth/{provider}", get(oauth_start))
        .route(OAUTH_CALLBACK_PATH, get(oauth_callback))
}

/// Public view of an account.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            username: user.metadata_str("username").map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: Option<UserResponse>,
    /// False when the account still needs its email confirmed.
    pub session_established: bool,
}

fn flow_for(state: &AppState, client: Arc<AuthClient>) -> CredentialFlow {
    CredentialFlow::new(
        client,
        state.profiles.clone(),
        state.config.oauth_callback_url(),
    )
}

/// Flatten validation errors into one stable, readable message.
fn validation_error(errors: ValidationErrors) -> AppError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let reason = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "is invalid".to_string());
            format!("{} {}", field, reason)
        })
        .collect();
    messages.sort();
    AppError::BadRequest(messages.join("; "))
}

// ─── Password Sign-In ────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Sign in with email and password, recovering once from an unconfirmed email.
async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<SignInRequest>, AppError>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    req.validate().map_err(validation_error)?;

    let client = Arc::new(AuthClient::new(state.identity.clone()));
    let flow = flow_for(&state, client.clone());
    let confirmer = state.admin.clone().map(AdminConfirmer::new);

    sign_in_with_recovery(
        &flow,
        confirmer.as_ref().map(|c| c as &dyn EmailConfirmer),
        &req.email,
        &req.password,
        state.config.confirm_retry_delay,
    )
    .await?;

    let session = client.current_session().await.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("Sign-in succeeded without a session"))
    })?;

    tracing::info!(user_id = %session.user.id, "User signed in");

    let jar = store_session(jar, &session, state.config.secure_cookies());
    Ok((
        jar,
        Json(AuthResponse {
            user: Some(UserResponse::from(&session.user)),
            session_established: true,
        }),
    ))
}

// ─── Sign-Up ─────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "does not match password"))]
    pub confirm_password: String,
    #[serde(default)]
    #[validate(length(max = 50, message = "must be at most 50 characters"))]
    pub username: Option<String>,
}

/// Register an account. Field checks, including password confirmation,
/// happen before any call to the identity service.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<SignUpRequest>, AppError>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    req.validate().map_err(validation_error)?;

    let client = Arc::new(AuthClient::new(state.identity.clone()));
    let flow = flow_for(&state, client);

    let outcome = flow
        .sign_up(&req.email, &req.password, req.username.as_deref())
        .await?;

    tracing::info!(
        user_id = ?outcome.user.as_ref().map(|u| u.id.as_str()),
        session = outcome.session.is_some(),
        "User signed up"
    );

    let jar = match &outcome.session {
        Some(session) => store_session(jar, session, state.config.secure_cookies()),
        None => jar,
    };

    Ok((
        jar,
        Json(AuthResponse {
            user: outcome.user.as_ref().map(UserResponse::from),
            session_established: outcome.session.is_some(),
        }),
    ))
}

// ─── Sign-Out ────────────────────────────────────────────────

/// Sign out. Cookies are cleared whatever the identity service says.
async fn sign_out(
    State(state): State<Arc<AppState>>,
    MaybeSignedIn(session): MaybeSignedIn,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    if let Some(session) = session {
        let user_id = session.user.id.clone();
        let client = Arc::new(AuthClient::with_session(
            state.identity.clone(),
            Some(session),
        ));

        match flow_for(&state, client).sign_out().await {
            Ok(()) => tracing::info!(user_id = %user_id, "User signed out"),
            Err(e) => tracing::warn!(user_id = %user_id, error = ?e, "Remote sign-out failed"),
        }
    }

    (
        clear_session(jar, state.config.secure_cookies()),
        StatusCode::NO_CONTENT,
    )
}

// ─── OAuth ───────────────────────────────────────────────────

/// Start an OAuth handshake with one of the supported providers.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let provider: OAuthProvider = provider.parse().map_err(AppError::BadRequest)?;

    let client = Arc::new(AuthClient::new(state.identity.clone()));
    let redirect = flow_for(&state, client).sign_in_with_oauth(provider)?;

    let jar = store_pkce_verifier(jar, &redirect.code_verifier, state.config.secure_cookies());
    Ok((jar, Redirect::temporary(&redirect.url)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

fn sign_in_error_location(message: &str) -> String {
    format!("{}?error={}", SIGN_IN_PATH, urlencoding::encode(message))
}

/// The fixed OAuth callback target: exchange the code for a session.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let secure = state.config.secure_cookies();
    let (jar, verifier) = take_pkce_verifier(jar, secure);

    if let Some(error) = params.error {
        let message = params.error_description.unwrap_or(error);
        tracing::warn!(error = %message, "OAuth error from provider");
        return (jar, Redirect::temporary(&sign_in_error_location(&message)));
    }

    let (Some(code), Some(verifier)) = (params.code, verifier) else {
        tracing::warn!("OAuth callback without code or verifier");
        return (
            jar,
            Redirect::temporary(&sign_in_error_location("OAuth sign-in could not be completed")),
        );
    };

    let client = Arc::new(AuthClient::new(state.identity.clone()));
    match flow_for(&state, client).complete_oauth(&code, &verifier).await {
        Ok(session) => {
            tracing::info!(user_id = %session.user.id, "OAuth sign-in completed");
            (
                store_session(jar, &session, secure),
                Redirect::temporary(HOME_PATH),
            )
        }
        Err(e) => {
            tracing::warn!(error = ?e, "OAuth code exchange failed");
            (jar, Redirect::temporary(&sign_in_error_location(&e.to_string())))
        }
    }
}
