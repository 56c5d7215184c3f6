// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgREST client for the `profiles` table.
//!
//! Requests carry the publishable key plus the caller's access token, so the
//! table's row-level security decides what each user may read and write.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::db::{tables, ProfileStore, StoreError};
use crate::models::{Profile, ProfileChanges, Session};

/// Postgres error code for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Profile table client.
#[derive(Clone)]
pub struct PostgrestProfiles {
    http: reqwest::Client,
    table_url: String,
    api_key: String,
}

impl PostgrestProfiles {
    pub fn new(project_url: &str, publishable_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            table_url: format!(
                "{}/rest/v1/{}",
                project_url.trim_end_matches('/'),
                tables::PROFILES
            ),
            api_key: publishable_key.to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, session: &Session) -> reqwest::RequestBuilder {
        self.http
            .request(method, &self.table_url)
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        builder: reqwest::RequestBuilder,
        body: &B,
    ) -> Result<Vec<Profile>, StoreError> {
        let response = builder
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(transport)?;

        check_response_json(response).await
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfiles {
    async fn fetch(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<Option<Profile>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, session)
            .query(&[("id", format!("eq.{}", user_id)), ("select", "*".to_string())])
            .send()
            .await
            .map_err(transport)?;

        let rows: Vec<Profile> = check_response_json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, session: &Session, profile: &Profile) -> Result<Profile, StoreError> {
        let builder = self.request(reqwest::Method::POST, session);
        self.write(builder, profile)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| empty_representation("insert"))
    }

    async fn update(
        &self,
        session: &Session,
        user_id: &str,
        changes: &ProfileChanges,
    ) -> Result<Profile, StoreError> {
        let builder = self
            .request(reqwest::Method::PATCH, session)
            .query(&[("id", format!("eq.{}", user_id))]);

        self.write(builder, changes)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Rejected {
                status: 404,
                message: "Profile not found".to_string(),
            })
    }
}

/// PostgREST error body.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn classify_error(status: u16, body: &str) -> StoreError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();

    if status == 409 || parsed.code.as_deref() == Some(UNIQUE_VIOLATION) {
        return StoreError::Conflict;
    }

    StoreError::Rejected {
        status,
        message: parsed.message.unwrap_or_else(|| format!("HTTP {}", status)),
    }
}

fn empty_representation(op: &str) -> StoreError {
    StoreError::Rejected {
        status: 500,
        message: format!("Profile {} returned no row", op),
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

/// Check response and parse JSON body.
async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StoreError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(classify_error(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| StoreError::Transport(format!("Malformed response: {}", e)))
}
