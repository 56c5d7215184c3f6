// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! REST client for the hosted identity service (GoTrue API).
//!
//! Handles:
//! - Password sign-in, sign-up and sign-out
//! - Refresh-token rotation and access-token validation
//! - PKCE authorize URLs and code exchange for OAuth providers
//! - Admin lookups and forced email confirmation (service key only)

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};

use crate::models::{Session, User};
use crate::services::identity::{
    IdentityAdmin, IdentityApi, IdentityError, OAuthProvider, SignUpOutcome,
};

/// Page size used when scanning the admin user list.
const ADMIN_PAGE_SIZE: u32 = 200;
/// Upper bound on pages scanned for a single email lookup.
const ADMIN_MAX_PAGES: u32 = 50;

/// Identity service client using the publishable key.
#[derive(Clone)]
pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoTrueClient {
    /// Create a client for `<project_url>/auth/v1`.
    pub fn new(project_url: &str, publishable_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            api_key: publishable_key.to_string(),
        }
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, IdentityError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let token: TokenResponse = check_response_json(response).await?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }
}

#[async_trait]
impl IdentityApi for GoTrueClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<SignUpOutcome, IdentityError> {
        let response = self
            .http
            .post(format!("{}/signup", self.base_url))
            .header("apikey", &self.api_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await
            .map_err(transport)?;

        let body: Value = check_response_json(response).await?;
        parse_sign_up(body, chrono::Utc::now().timestamp())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        check_response(response).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn get_user(&self, access_token: &str) -> Result<User, IdentityError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(transport)?;

        check_response_json(response).await
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "{}/authorize?\
             provider={}&\
             redirect_to={}&\
             code_challenge={}&\
             code_challenge_method=s256",
            self.base_url,
            provider,
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge)
        )
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, IdentityError> {
        self.token_grant(
            "pkce",
            json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
        )
        .await
    }
}

/// Identity service client holding the privileged service key.
///
/// Only constructed server-side when `SUPABASE_SERVICE_ROLE_KEY` is set.
#[derive(Clone)]
pub struct GoTrueAdmin {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl GoTrueAdmin {
    pub fn new(project_url: &str, service_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("{}/auth/v1/admin", project_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<User>,
}

#[async_trait]
impl IdentityAdmin for GoTrueAdmin {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        let wanted = email.trim();

        for page in 1..=ADMIN_MAX_PAGES {
            let response = self
                .http
                .get(format!("{}/users", self.base_url))
                .query(&[
                    ("page", page.to_string()),
                    ("per_page", ADMIN_PAGE_SIZE.to_string()),
                ])
                .header("apikey", &self.service_key)
                .bearer_auth(&self.service_key)
                .send()
                .await
                .map_err(transport)?;

            let batch: UserPage = check_response_json(response).await?;
            let fetched = batch.users.len() as u32;

            if let Some(user) = batch.users.into_iter().find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
            }) {
                return Ok(Some(user));
            }

            if fetched < ADMIN_PAGE_SIZE {
                return Ok(None);
            }
        }

        tracing::warn!(
            pages = ADMIN_MAX_PAGES,
            "Admin user scan hit page limit without finding email"
        );
        Ok(None)
    }

    async fn confirm_email(&self, user_id: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .put(format!("{}/users/{}", self.base_url, user_id))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({ "email_confirm": true }))
            .send()
            .await
            .map_err(transport)?;

        check_response(response).await
    }
}

// ─── Wire Formats ────────────────────────────────────────────

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// Error body. Older and newer API versions use different field names.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Sign-up answers with a session when autoconfirm is on, otherwise with
/// the bare user.
fn parse_sign_up(body: Value, now: i64) -> Result<SignUpOutcome, IdentityError> {
    if body.get("access_token").is_some() {
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| IdentityError::Transport(format!("Malformed sign-up session: {}", e)))?;
        let session = token.into_session(now);
        return Ok(SignUpOutcome {
            user: Some(session.user.clone()),
            session: Some(session),
        });
    }

    let user = match body.get("user") {
        Some(inner) if !inner.is_null() => serde_json::from_value(inner.clone()).ok(),
        _ => serde_json::from_value::<User>(body).ok(),
    };

    Ok(SignUpOutcome {
        user,
        session: None,
    })
}

/// Map an error status and body to an [`IdentityError`].
fn classify_error(status: u16, body: &str) -> IdentityError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    let message = parsed
        .error_description
        .or(parsed.msg)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP {}", status));

    let unconfirmed = parsed.error_code.as_deref() == Some("email_not_confirmed")
        || message.to_ascii_lowercase().contains("email not confirmed");

    if unconfirmed {
        IdentityError::EmailNotConfirmed
    } else if status == 404 && parsed.error_code.as_deref() == Some("user_not_found") {
        IdentityError::UserNotFound
    } else {
        IdentityError::rejected(status, message)
    }
}

fn transport(err: reqwest::Error) -> IdentityError {
    IdentityError::Transport(err.to_string())
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<(), IdentityError> {
    if response.status().is_success() {
        return Ok(());
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body))
}

/// Check response and parse JSON body.
async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, IdentityError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(classify_error(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| IdentityError::Transport(format!("Malformed response: {}", e)))
}
