// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (session restoration, route guard, security, etc.).

pub mod auth;
pub mod guard;
pub mod internal;
pub mod security;

pub use guard::route_guard;
pub use internal::require_internal;
