// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route guard behavior over cookie-held sessions.

use axum::http::StatusCode;
use mavprep_auth::config::Config;
use mavprep_auth::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use std::sync::atomic::Ordering;
use tower::ServiceExt;

mod common;
use common::{body_json, cookie_value, get, location, session_cookie, TEST_PASSWORD};

#[tokio::test]
async fn test_anonymous_protected_request_redirects_to_sign_in() {
    let app = common::create_test_app();

    for (path, expected) in [
        ("/dashboard", "/login?redirectTo=%2Fdashboard"),
        ("/profile", "/login?redirectTo=%2Fprofile"),
        ("/settings/billing", "/login?redirectTo=%2Fsettings%2Fbilling"),
    ] {
        let response = app.router.clone().oneshot(get(path, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&response).as_deref(), Some(expected));
    }
}

#[tokio::test]
async fn test_signed_in_request_is_never_redirected_from_protected_paths() {
    let app = common::create_test_app();
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let session = app.identity.session_for(&user);
    let cookie = session_cookie(&session);

    for path in ["/dashboard", "/profile", "/settings"] {
        let response = app
            .router
            .clone()
            .oneshot(get(path, Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }

    // Verified locally with the JWT secret.
    assert_eq!(app.identity.get_user_calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.identity.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_signed_in_request_to_auth_pages_redirects_home() {
    let app = common::create_test_app();
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let cookie = session_cookie(&app.identity.session_for(&user));

    for path in ["/login", "/signup"] {
        let response = app
            .router
            .clone()
            .oneshot(get(path, Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&response).as_deref(), Some("/"));
    }
}

#[tokio::test]
async fn test_anonymous_request_to_public_pages_passes() {
    let app = common::create_test_app();

    for path in ["/", "/login", "/signup", "/health"] {
        let response = app.router.clone().oneshot(get(path, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_and_cookies_rewritten() {
    let app = common::create_test_app();
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let session = app.identity.expired_session_for(&user);

    let response = app
        .router
        .clone()
        .oneshot(get("/dashboard", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.identity.refresh_calls.load(Ordering::SeqCst), 1);

    let access = cookie_value(&response, ACCESS_TOKEN_COOKIE).expect("access cookie rewritten");
    let refresh = cookie_value(&response, REFRESH_TOKEN_COOKIE).expect("refresh cookie rewritten");
    assert!(!access.is_empty());
    assert_ne!(access, session.access_token);
    assert_ne!(refresh, session.refresh_token);

    let body = body_json(response).await;
    assert_eq!(body["user"]["id"], user.id);
}

#[tokio::test]
async fn test_rejected_refresh_clears_cookies_and_redirects() {
    let app = common::create_test_app();
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let mut session = app.identity.expired_session_for(&user);
    session.refresh_token = "revoked".to_string();

    let response = app
        .router
        .clone()
        .oneshot(get("/dashboard", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        location(&response).as_deref(),
        Some("/login?redirectTo=%2Fdashboard")
    );
    assert_eq!(cookie_value(&response, ACCESS_TOKEN_COOKIE).as_deref(), Some(""));
    assert_eq!(cookie_value(&response, REFRESH_TOKEN_COOKIE).as_deref(), Some(""));
}

#[tokio::test]
async fn test_identity_outage_degrades_to_pass_through() {
    let app = common::create_test_app();
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let session = app.identity.expired_session_for(&user);
    app.identity.offline.store(true, Ordering::SeqCst);

    let cookie = session_cookie(&session);

    // Not redirected: the guard lets the request through and the handler
    // sees no session.
    let response = app
        .router
        .clone()
        .oneshot(get("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(common::set_cookies(&response).is_empty());

    let response = app
        .router
        .clone()
        .oneshot(get("/", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_static_assets_skip_session_restoration() {
    let app = common::create_test_app();
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let session = app.identity.expired_session_for(&user);
    let cookie = session_cookie(&session);

    for path in ["/static/app.js", "/favicon.ico", "/dashboard/hero.png"] {
        let response = app
            .router
            .clone()
            .oneshot(get(path, Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }

    assert_eq!(app.identity.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_without_jwt_secret_tokens_are_checked_remotely() {
    let config = Config {
        jwt_secret: None,
        ..Config::test_default()
    };
    let app = common::create_test_app_with(config, true);
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let cookie = session_cookie(&app.identity.session_for(&user));

    let response = app
        .router
        .clone()
        .oneshot(get("/dashboard", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.identity.get_user_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forged_token_is_not_trusted() {
    let app = common::create_test_app();
    let user = app.identity.add_user("ada@example.com", TEST_PASSWORD, true);
    let session = app.identity.session_for(&user);

    // Re-sign the same claims with a different key.
    let claims = mavprep_auth::middleware::auth::decode_claims(&session.access_token, None).unwrap();
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(b"not-the-real-secret"),
    )
    .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/dashboard",
            Some(&format!("{}={}", ACCESS_TOKEN_COOKIE, forged)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_guard_responses_carry_security_headers() {
    let app = common::create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get("/dashboard", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("X-Frame-Options").unwrap(),
        "DENY"
    );
}

#[tokio::test]
async fn test_sign_in_page_keeps_only_same_site_return_targets() {
    let app = common::create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get("/login?redirectTo=%2Fdashboard", None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["redirect_to"], "/dashboard");

    for target in ["%2F%2Fevil.com", "%2F%5Cevil.com", "https%3A%2F%2Fevil.com"] {
        let response = app
            .router
            .clone()
            .oneshot(get(&format!("/login?redirectTo={target}"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["redirect_to"].is_null(), "{target}");
    }
}
