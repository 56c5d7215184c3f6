// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use jsonwebtoken::{encode, EncodingKey, Header};
use mavprep_auth::config::Config;
use mavprep_auth::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use mavprep_auth::db::MemoryProfileStore;
use mavprep_auth::middleware::auth::{decode_claims, Claims};
use mavprep_auth::models::{Session, User};
use mavprep_auth::routes::create_router;
use mavprep_auth::services::pkce::challenge_for;
use mavprep_auth::services::{
    IdentityAdmin, IdentityApi, IdentityError, OAuthProvider, SignUpOutcome,
};
use mavprep_auth::AppState;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "correct-horse";

/// Access token lifetime for sessions the fake issues.
const SESSION_TTL_SECS: i64 = 3600;

fn test_secret() -> Vec<u8> {
    Config::test_default()
        .jwt_secret
        .expect("test config has a JWT secret")
}

/// Mint an access token signed with the test secret.
#[allow(dead_code)]
pub fn create_test_jwt(user: &User, exp: i64) -> String {
    let claims = Claims {
        sub: user.id.clone(),
        exp,
        email: user.email.clone(),
        user_metadata: user.user_metadata.clone(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&test_secret()),
    )
    .expect("Failed to encode test JWT")
}

struct Account {
    user: User,
    password: String,
    confirmed: bool,
}

/// In-process identity service with both the public and admin surfaces.
///
/// Call counters let tests assert exactly how many remote calls were made.
#[derive(Default)]
pub struct FakeIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    refresh_tokens: Mutex<HashMap<String, String>>,
    oauth_codes: Mutex<HashMap<String, (String, String)>>,
    next_id: AtomicUsize,
    /// New accounts are confirmed (and get a session) immediately.
    pub autoconfirm: AtomicBool,
    /// Every call fails with a transport error.
    pub offline: AtomicBool,
    pub sign_in_calls: AtomicUsize,
    pub sign_up_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub get_user_calls: AtomicUsize,
    pub confirm_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register an account directly, bypassing sign-up.
    pub fn add_user(&self, email: &str, password: &str, confirmed: bool) -> User {
        let n = self.next_id();
        let user = User {
            id: format!("00000000-0000-4000-8000-{:012}", n),
            email: Some(email.to_string()),
            user_metadata: Map::new(),
            email_confirmed_at: confirmed.then(|| "2026-01-01T00:00:00Z".to_string()),
        };
        self.accounts.lock().unwrap().insert(
            email.to_lowercase(),
            Account {
                user: user.clone(),
                password: password.to_string(),
                confirmed,
            },
        );
        user
    }

    pub fn is_confirmed(&self, email: &str) -> bool {
        self.accounts
            .lock()
            .unwrap()
            .get(&email.to_lowercase())
            .map(|a| a.confirmed)
            .unwrap_or(false)
    }

    /// Issue a session for `user` whose access token expires at `exp`.
    pub fn session_expiring(&self, user: &User, exp: i64) -> Session {
        let refresh_token = format!("refresh-{}", self.next_id());
        self.refresh_tokens
            .lock()
            .unwrap()
            .insert(refresh_token.clone(), user.id.clone());

        Session {
            access_token: create_test_jwt(user, exp),
            refresh_token,
            token_type: "bearer".to_string(),
            expires_at: exp,
            user: user.clone(),
        }
    }

    pub fn session_for(&self, user: &User) -> Session {
        self.session_expiring(user, chrono::Utc::now().timestamp() + SESSION_TTL_SECS)
    }

    /// A session whose access token has already expired.
    pub fn expired_session_for(&self, user: &User) -> Session {
        self.session_expiring(user, chrono::Utc::now().timestamp() - 60)
    }

    /// Simulate the provider redirecting back with an authorization code.
    pub fn issue_oauth_code(&self, email: &str, code_challenge: &str) -> String {
        let code = format!("code-{}", self.next_id());
        self.oauth_codes
            .lock()
            .unwrap()
            .insert(code.clone(), (email.to_lowercase(), code_challenge.to_string()));
        code
    }

    fn check_online(&self) -> Result<(), IdentityError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(IdentityError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn user_by_id(&self, id: &str) -> Option<User> {
        self.accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.user.id == id)
            .map(|a| a.user.clone())
    }
}

#[async_trait]
impl IdentityApi for FakeIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let user = {
            let accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get(&email.to_lowercase())
                .filter(|a| a.password == password)
                .ok_or_else(|| IdentityError::rejected(400, "Invalid login credentials"))?;
            if !account.confirmed {
                return Err(IdentityError::EmailNotConfirmed);
            }
            account.user.clone()
        };

        Ok(self.session_for(&user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
    ) -> Result<SignUpOutcome, IdentityError> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        if self.accounts.lock().unwrap().contains_key(&email.to_lowercase()) {
            return Err(IdentityError::rejected(422, "User already registered"));
        }

        let confirmed = self.autoconfirm.load(Ordering::SeqCst);
        let mut user = self.add_user(email, password, confirmed);
        user.user_metadata = metadata;
        if let Some(account) = self.accounts.lock().unwrap().get_mut(&email.to_lowercase()) {
            account.user = user.clone();
        }

        let session = confirmed.then(|| self.session_for(&user));
        Ok(SignUpOutcome {
            user: Some(user),
            session,
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), IdentityError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let user_id = self
            .refresh_tokens
            .lock()
            .unwrap()
            .remove(refresh_token)
            .ok_or_else(|| IdentityError::rejected(400, "Invalid Refresh Token"))?;
        let user = self
            .user_by_id(&user_id)
            .ok_or(IdentityError::UserNotFound)?;

        Ok(self.session_for(&user))
    }

    async fn get_user(&self, access_token: &str) -> Result<User, IdentityError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let claims = decode_claims(access_token, Some(&test_secret()))
            .map_err(|_| IdentityError::rejected(401, "invalid JWT"))?;
        self.user_by_id(&claims.sub)
            .ok_or(IdentityError::UserNotFound)
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "https://identity.test/auth/v1/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            provider,
            urlencoding::encode(redirect_to),
            code_challenge
        )
    }

    async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, IdentityError> {
        self.check_online()?;

        let (email, challenge) = self
            .oauth_codes
            .lock()
            .unwrap()
            .remove(auth_code)
            .ok_or_else(|| IdentityError::rejected(400, "invalid flow state, no valid flow state found"))?;
        if challenge_for(code_verifier) != challenge {
            return Err(IdentityError::rejected(400, "code challenge does not match previously saved code verifier"));
        }

        let existing = self
            .accounts
            .lock()
            .unwrap()
            .get(&email)
            .map(|a| a.user.clone());
        let user = existing.unwrap_or_else(|| self.add_user(&email, "", true));
        Ok(self.session_for(&user))
    }
}

#[async_trait]
impl IdentityAdmin for FakeIdentity {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, IdentityError> {
        self.check_online()?;
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&email.to_lowercase())
            .map(|a| a.user.clone()))
    }

    async fn confirm_email(&self, user_id: &str) -> Result<(), IdentityError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .values_mut()
            .find(|a| a.user.id == user_id)
            .ok_or(IdentityError::UserNotFound)?;
        account.confirmed = true;
        account.user.email_confirmed_at = Some("2026-01-01T00:00:00Z".to_string());
        Ok(())
    }
}

/// Everything a test needs to drive the app and inspect its collaborators.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub identity: Arc<FakeIdentity>,
    pub profiles: Arc<MemoryProfileStore>,
}

/// Create a test app backed by in-process fakes.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default(), true)
}

/// Create a test app with a custom config, optionally without the admin API.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config, with_admin: bool) -> TestApp {
    let identity = FakeIdentity::new();
    let profiles = Arc::new(MemoryProfileStore::new());

    let admin = if with_admin {
        Some(identity.clone() as Arc<dyn IdentityAdmin>)
    } else {
        None
    };

    let state = Arc::new(AppState {
        config,
        identity: identity.clone(),
        admin,
        profiles: profiles.clone(),
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        identity,
        profiles,
    }
}

/// `Cookie` header value carrying a session.
#[allow(dead_code)]
pub fn session_cookie(session: &Session) -> String {
    format!(
        "{}={}; {}={}",
        ACCESS_TOKEN_COOKIE, session.access_token, REFRESH_TOKEN_COOKIE, session.refresh_token
    )
}

#[allow(dead_code)]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    json_request("POST", uri, body, cookie)
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// A POST whose body is sent as-is, optionally without a content type.
#[allow(dead_code)]
pub fn raw_post(uri: &str, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// All `Set-Cookie` values on a response.
#[allow(dead_code)]
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// Value of a cookie set on the response, if any.
#[allow(dead_code)]
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response).into_iter().find_map(|c| {
        c.strip_prefix(&prefix)
            .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
    })
}

#[allow(dead_code)]
pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
