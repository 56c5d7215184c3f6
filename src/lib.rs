// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MavPrep auth gateway
//!
//! This crate provides the authentication backend for the MavPrep landing
//! site: a route guard over cookie-held sessions, the credential flows
//! (password, sign-up, OAuth), lazy profile creation, and a client-side
//! session context for trusted Rust callers.

pub mod config;
pub mod context;
pub mod cookies;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::ProfileStore;
use services::{IdentityAdmin, IdentityApi};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityApi>,
    /// Present only when the service key is configured.
    pub admin: Option<Arc<dyn IdentityAdmin>>,
    pub profiles: Arc<dyn ProfileStore>,
}
