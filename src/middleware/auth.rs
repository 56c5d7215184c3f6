// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session reconstruction from request cookies.

use crate::cookies::{clear_session, session_tokens, store_session};
use crate::error::AppError;
use crate::models::{Session, User};
use crate::services::auth_client::REFRESH_LEEWAY_SECS;
use crate::services::IdentityError;
use crate::AppState;
use anyhow::anyhow;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Access token claims issued by the identity service.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl Claims {
    fn into_user(self) -> User {
        User {
            id: self.sub,
            email: self.email,
            user_metadata: self.user_metadata,
            email_confirmed_at: None,
        }
    }
}

/// Decode an access token's claims without checking expiry.
///
/// With `secret` the HS256 signature is verified; without it the claims are
/// only parsed and the caller must validate the token some other way.
pub fn decode_claims(token: &str, secret: Option<&[u8]>) -> jsonwebtoken::errors::Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.validate_aud = false;

    let key = match secret {
        Some(secret) => DecodingKey::from_secret(secret),
        None => {
            validation.insecure_disable_signature_validation();
            DecodingKey::from_secret(&[])
        }
    };

    Ok(decode::<Claims>(token, &key, &validation)?.claims)
}

/// Session restored for one request, plus any cookie changes the
/// restoration made (rotated tokens or cleared cookies).
#[derive(Debug)]
pub struct RestoredSession {
    pub session: Option<Session>,
    pub jar: CookieJar,
}

/// Rebuild the caller's session from its cookies.
///
/// A live access token is accepted as is (verified locally when the JWT
/// secret is known, otherwise with one user lookup). An expired or invalid
/// one is replaced using the refresh token. Only transport failures are
/// returned as errors.
pub async fn restore_session(state: &AppState, jar: CookieJar) -> anyhow::Result<RestoredSession> {
    let (access_token, refresh_token) = session_tokens(&jar);
    let secure = state.config.secure_cookies();
    let secret = state.config.jwt_secret.as_deref();
    let now = chrono::Utc::now().timestamp();

    if let Some(access_token) = access_token {
        match decode_claims(&access_token, secret) {
            Ok(claims) => {
                // Refresh a little early when we are able to.
                let leeway = if refresh_token.is_some() {
                    REFRESH_LEEWAY_SECS
                } else {
                    0
                };

                if claims.exp > now + leeway {
                    let expires_at = claims.exp;
                    let user = if secret.is_some() {
                        Some(claims.into_user())
                    } else {
                        match state.identity.get_user(&access_token).await {
                            Ok(user) => Some(user),
                            Err(IdentityError::Transport(detail)) => {
                                return Err(anyhow!("User lookup failed: {}", detail))
                            }
                            Err(err) => {
                                tracing::debug!(error = %err, "Access token rejected by identity service");
                                None
                            }
                        }
                    };

                    if let Some(user) = user {
                        let session = Session {
                            access_token,
                            refresh_token: refresh_token.unwrap_or_default(),
                            token_type: "bearer".to_string(),
                            expires_at,
                            user,
                        };
                        return Ok(RestoredSession {
                            session: Some(session),
                            jar,
                        });
                    }
                } else {
                    tracing::debug!(user_id = %claims.sub, "Access token expired");
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "Invalid access token cookie");
            }
        }
    }

    let Some(refresh_token) = refresh_token else {
        return Ok(RestoredSession { session: None, jar });
    };

    match state.identity.refresh_session(&refresh_token).await {
        Ok(session) => {
            tracing::debug!(user_id = %session.user.id, "Session refreshed from cookie");
            let jar = store_session(jar, &session, secure);
            Ok(RestoredSession {
                session: Some(session),
                jar,
            })
        }
        Err(IdentityError::Transport(detail)) => Err(anyhow!("Session refresh failed: {}", detail)),
        Err(err) => {
            tracing::info!(error = %err, "Refresh token rejected, clearing session cookies");
            Ok(RestoredSession {
                session: None,
                jar: clear_session(jar, secure),
            })
        }
    }
}

/// Session the route guard restored, stored in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

/// Extractor for handlers that need a signed-in caller.
#[derive(Debug, Clone)]
pub struct SignedIn(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for SignedIn {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .map(|current| SignedIn(current.0.clone()))
            .ok_or(AppError::Unauthorized)
    }
}

/// Extractor for handlers that behave differently for signed-in callers.
#[derive(Debug, Clone)]
pub struct MaybeSignedIn(pub Option<Session>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeSignedIn {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSignedIn(
            parts
                .extensions
                .get::<CurrentSession>()
                .map(|current| current.0.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token(secret: &[u8], exp: i64) -> String {
        let claims = json!({
            "sub": "user-1",
            "exp": exp,
            "aud": "authenticated",
            "email": "ada@example.com",
            "user_metadata": {"username": "ada"}
        });
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn test_decode_claims_verifies_signature() {
        let jwt = token(b"right", 0);
        assert!(decode_claims(&jwt, Some(b"wrong")).is_err());

        let claims = decode_claims(&jwt, Some(b"right")).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp, 0);
    }

    #[test]
    fn test_decode_claims_without_secret_parses_only() {
        let jwt = token(b"unknown", 42);
        let user = decode_claims(&jwt, None).unwrap().into_user();

        assert_eq!(user.id, "user-1");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.metadata_str("username"), Some("ada"));
    }

    #[test]
    fn test_decode_claims_rejects_garbage() {
        assert!(decode_claims("not.a.jwt", None).is_err());
    }
}
