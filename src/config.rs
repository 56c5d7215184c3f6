// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Two credential tiers are read: the publishable key used for every normal
//! identity and profile request, and the service key that unlocks the admin
//! API. The service key is only ever sent from this process to the identity
//! service and is never written into a response.

use std::env;
use std::fmt;
use std::time::Duration;

/// Delay before the single sign-in retry after a forced email confirmation.
pub const DEFAULT_CONFIRM_RETRY_DELAY_MS: u64 = 1000;

/// Paths that need a signed-in session unless overridden by `PROTECTED_PATHS`.
pub const DEFAULT_PROTECTED_PATHS: &[&str] = &["/dashboard", "/profile", "/settings"];

/// Application configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Base URL of the identity/database service (no trailing slash)
    pub supabase_url: String,
    /// Publishable client key, sent as `apikey` on normal requests
    pub publishable_key: String,
    /// Public origin of this site, used for the OAuth callback target
    pub site_url: String,
    /// Server port
    pub port: u16,
    /// Delay before retrying sign-in after a forced confirmation
    pub confirm_retry_delay: Duration,
    /// Path prefixes that require a session
    pub protected_paths: Vec<String>,

    // --- Secrets ---
    /// Privileged service key for admin operations
    pub service_role_key: Option<String>,
    /// HS256 secret the identity service signs access tokens with
    pub jwt_secret: Option<Vec<u8>>,
    /// Bearer token trusted callers present to reach the confirm-user endpoint
    pub internal_api_token: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact<T>(value: &Option<T>) -> &'static str {
            if value.is_some() {
                "<redacted>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("Config")
            .field("supabase_url", &self.supabase_url)
            .field("site_url", &self.site_url)
            .field("port", &self.port)
            .field("confirm_retry_delay", &self.confirm_retry_delay)
            .field("protected_paths", &self.protected_paths)
            .field("service_role_key", &redact(&self.service_role_key))
            .field("jwt_secret", &redact(&self.jwt_secret))
            .field("internal_api_token", &redact(&self.internal_api_token))
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is honored for local development.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let supabase_url = env::var("SUPABASE_URL")
            .map_err(|_| ConfigError::Missing("SUPABASE_URL"))?
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            return Err(ConfigError::Invalid("SUPABASE_URL", supabase_url));
        }

        let confirm_retry_delay = match env::var("CONFIRM_RETRY_DELAY_MS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::Invalid("CONFIRM_RETRY_DELAY_MS", raw))?,
            Err(_) => Duration::from_millis(DEFAULT_CONFIRM_RETRY_DELAY_MS),
        };

        let protected_paths = env::var("PROTECTED_PATHS")
            .ok()
            .map(|raw| parse_path_list(&raw))
            .filter(|paths| !paths.is_empty())
            .unwrap_or_else(default_protected_paths);

        Ok(Self {
            supabase_url,
            publishable_key: env::var("SUPABASE_PUBLISHABLE_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SUPABASE_PUBLISHABLE_KEY"))?,
            site_url: env::var("SITE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            confirm_retry_delay,
            protected_paths,

            service_role_key: optional_secret("SUPABASE_SERVICE_ROLE_KEY"),
            jwt_secret: optional_secret("SUPABASE_JWT_SECRET").map(String::into_bytes),
            internal_api_token: optional_secret("INTERNAL_API_TOKEN"),
        })
    }

    /// Config for tests: local URLs, known secrets, no retry delay.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:54321".to_string(),
            publishable_key: "test_publishable_key".to_string(),
            site_url: "http://localhost:3000".to_string(),
            port: 8080,
            confirm_retry_delay: Duration::ZERO,
            protected_paths: default_protected_paths(),
            service_role_key: Some("test_service_role_key".to_string()),
            jwt_secret: Some(b"test_jwt_secret_32_bytes_minimum!!".to_vec()),
            internal_api_token: Some("test_internal_token".to_string()),
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.site_url.starts_with("https://")
    }

    /// Fixed target the identity service redirects to after an OAuth handshake.
    pub fn oauth_callback_url(&self) -> String {
        format!("{}/auth/callback", self.site_url)
    }
}

fn default_protected_paths() -> Vec<String> {
    DEFAULT_PROTECTED_PATHS.iter().map(|p| p.to_string()).collect()
}

fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| p.starts_with('/'))
        .map(str::to_string)
        .collect()
}

fn optional_secret(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("SUPABASE_URL", "https://project.supabase.co/");
        env::set_var("SUPABASE_PUBLISHABLE_KEY", "pk_test");
        env::set_var("PROTECTED_PATHS", "/dashboard, /billing ,nope");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.supabase_url, "https://project.supabase.co");
        assert_eq!(config.publishable_key, "pk_test");
        assert_eq!(config.port, 8080);
        assert_eq!(config.protected_paths, vec!["/dashboard", "/billing"]);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::test_default();
        let rendered = format!("{:?}", config);

        assert!(!rendered.contains("test_service_role_key"));
        assert!(!rendered.contains("test_internal_token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_callback_url_and_cookie_security() {
        let mut config = Config::test_default();
        assert_eq!(config.oauth_callback_url(), "http://localhost:3000/auth/callback");
        assert!(!config.secure_cookies());

        config.site_url = "https://mavprep.app".to_string();
        assert!(config.secure_cookies());
    }
}
