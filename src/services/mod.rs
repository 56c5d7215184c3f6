// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth_client;
pub mod confirm;
pub mod credentials;
pub mod gotrue;
pub mod identity;
pub mod pkce;
pub mod profile;
pub mod recovery;
pub mod session_sync;

pub use auth_client::{AuthClient, AuthEvent, AuthEventKind};
pub use confirm::{confirm_user_email, AdminConfirmer, ConfirmEndpointClient, ConfirmError, EmailConfirmer};
pub use credentials::{CredentialFlow, OAuthRedirect};
pub use gotrue::{GoTrueAdmin, GoTrueClient};
pub use identity::{IdentityAdmin, IdentityApi, IdentityError, OAuthProvider, SignUpOutcome};
pub use profile::{ProfileError, ProfileLookup, ProfileResolver};
pub use recovery::sign_in_with_recovery;
pub use session_sync::{AuthSnapshot, SessionSynchronizer};
