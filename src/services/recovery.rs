// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in with one-shot recovery from an unconfirmed email.
//!
//! When sign-in fails only because the email is unconfirmed, force-confirm
//! the account, wait a fixed delay for the change to land, and retry once.
//! There is exactly one confirmation attempt and one retry.

use std::time::Duration;

use crate::services::confirm::EmailConfirmer;
use crate::services::credentials::CredentialFlow;
use crate::services::identity::IdentityError;

pub async fn sign_in_with_recovery(
    flow: &CredentialFlow,
    confirmer: Option<&dyn EmailConfirmer>,
    email: &str,
    password: &str,
    retry_delay: Duration,
) -> Result<(), IdentityError> {
    let err = match flow.sign_in(email, password).await {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };

    if err != IdentityError::EmailNotConfirmed {
        return Err(err);
    }

    let Some(confirmer) = confirmer else {
        tracing::warn!("Email not confirmed and no confirmer available");
        return Err(err);
    };

    tracing::info!("Email not confirmed, attempting automatic confirmation");
    if let Err(confirm_err) = confirmer.confirm_email(email).await {
        tracing::warn!(error = ?confirm_err, "Automatic email confirmation failed");
        return Err(err);
    }

    tokio::time::sleep(retry_delay).await;
    flow.sign_in(email, password).await
}
