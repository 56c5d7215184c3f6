// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public pages. The landing site renders these; the gateway only supplies
//! the data each page needs.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::middleware::auth::MaybeSignedIn;
use crate::middleware::guard::{HOME_PATH, SIGN_IN_PATH, SIGN_UP_PATH};
use crate::models::profile::display_name;
use crate::services::{OAuthProvider, ProfileResolver};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(HOME_PATH, get(home))
        .route(SIGN_IN_PATH, get(sign_in_page))
        .route(SIGN_UP_PATH, get(sign_up_page))
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub signed_in: bool,
    /// Greeting name for the navigation bar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

async fn home(
    State(state): State<Arc<AppState>>,
    MaybeSignedIn(session): MaybeSignedIn,
) -> Json<HomePage> {
    let Some(session) = session else {
        return Json(HomePage {
            signed_in: false,
            display_name: None,
        });
    };

    let lookup = ProfileResolver::new(state.profiles.clone())
        .resolve(Some(&session))
        .await;

    Json(HomePage {
        signed_in: true,
        display_name: Some(display_name(&session.user, lookup.profile.as_ref())),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInQuery {
    #[serde(default)]
    redirect_to: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInPage {
    pub providers: Vec<OAuthProvider>,
    /// Where to send the user after signing in, if the guard bounced them.
    pub redirect_to: Option<String>,
    pub error: Option<String>,
}

async fn sign_in_page(Query(query): Query<SignInQuery>) -> Json<SignInPage> {
    let redirect_to = query.redirect_to.filter(|target| is_same_site_path(target));

    Json(SignInPage {
        providers: OAuthProvider::ALL.to_vec(),
        redirect_to,
        error: query.error,
    })
}

/// Only same-site paths are honored as return targets. Browsers treat a
/// backslash like a slash, so `/\\host` is as much an authority as `//host`.
fn is_same_site_path(target: &str) -> bool {
    let mut chars = target.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/') | Some('\\'))
        && !target.chars().any(char::is_control)
}

#[derive(Debug, Serialize)]
pub struct SignUpPage {
    pub providers: Vec<OAuthProvider>,
}

async fn sign_up_page() -> Json<SignUpPage> {
    Json(SignUpPage {
        providers: OAuthProvider::ALL.to_vec(),
    })
}
