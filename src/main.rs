// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MavPrep auth gateway
//!
//! Serves the session-aware routes of the MavPrep landing site in front of
//! a hosted identity service and profile store.

use mavprep_auth::{
    config::Config,
    db::PostgrestProfiles,
    services::{GoTrueAdmin, GoTrueClient, IdentityAdmin},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting MavPrep auth gateway");

    let identity = Arc::new(GoTrueClient::new(
        &config.supabase_url,
        &config.publishable_key,
    ));

    // The admin capability exists only with the service key.
    let admin: Option<Arc<dyn IdentityAdmin>> = match &config.service_role_key {
        Some(key) => {
            tracing::info!("Admin API enabled");
            Some(Arc::new(GoTrueAdmin::new(&config.supabase_url, key)))
        }
        None => {
            tracing::warn!("SUPABASE_SERVICE_ROLE_KEY not set, email confirmation disabled");
            None
        }
    };

    if config.jwt_secret.is_none() {
        tracing::warn!("SUPABASE_JWT_SECRET not set, access tokens are validated remotely");
    }

    let profiles = Arc::new(PostgrestProfiles::new(
        &config.supabase_url,
        &config.publishable_key,
    ));

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        identity,
        admin,
        profiles,
    });

    // Build router
    let app = mavprep_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mavprep_auth=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
