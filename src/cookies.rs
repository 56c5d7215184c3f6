// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and OAuth cookies.
//!
//! Removal cookies must carry the same path as the cookie they remove, so
//! every cookie here is built by one function for both cases.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::models::Session;

pub const ACCESS_TOKEN_COOKIE: &str = "mavprep_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "mavprep_refresh_token";
pub const PKCE_VERIFIER_COOKIE: &str = "mavprep_pkce_verifier";

/// Path the OAuth verifier cookie is scoped to.
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

const SESSION_COOKIE_MAX_AGE: time::Duration = time::Duration::days(30);
const PKCE_COOKIE_MAX_AGE: time::Duration = time::Duration::minutes(10);

fn build(name: &'static str, value: String, path: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Access and refresh tokens presented with the request.
pub fn session_tokens(jar: &CookieJar) -> (Option<String>, Option<String>) {
    let read = |name: &str| {
        jar.get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };
    (read(ACCESS_TOKEN_COOKIE), read(REFRESH_TOKEN_COOKIE))
}

/// Write both session cookies.
pub fn store_session(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    let mut access = build(ACCESS_TOKEN_COOKIE, session.access_token.clone(), "/", secure);
    access.set_max_age(SESSION_COOKIE_MAX_AGE);
    let mut refresh = build(REFRESH_TOKEN_COOKIE, session.refresh_token.clone(), "/", secure);
    refresh.set_max_age(SESSION_COOKIE_MAX_AGE);

    jar.add(access).add(refresh)
}

/// Expire both session cookies.
pub fn clear_session(jar: CookieJar, secure: bool) -> CookieJar {
    jar.remove(build(ACCESS_TOKEN_COOKIE, String::new(), "/", secure))
        .remove(build(REFRESH_TOKEN_COOKIE, String::new(), "/", secure))
}

/// Remember the PKCE verifier until the OAuth callback.
pub fn store_pkce_verifier(jar: CookieJar, verifier: &str, secure: bool) -> CookieJar {
    let mut cookie = build(
        PKCE_VERIFIER_COOKIE,
        verifier.to_string(),
        OAUTH_CALLBACK_PATH,
        secure,
    );
    cookie.set_max_age(PKCE_COOKIE_MAX_AGE);
    jar.add(cookie)
}

/// Read and expire the PKCE verifier.
pub fn take_pkce_verifier(jar: CookieJar, secure: bool) -> (CookieJar, Option<String>) {
    let verifier = jar
        .get(PKCE_VERIFIER_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let jar = jar.remove(build(
        PKCE_VERIFIER_COOKIE,
        String::new(),
        OAUTH_CALLBACK_PATH,
        secure,
    ));
    (jar, verifier)
}
