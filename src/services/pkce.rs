// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PKCE verifier/challenge pairs for the OAuth redirect flow (RFC 7636, S256).

use anyhow::anyhow;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

/// Random bytes behind a verifier; encodes to 43 characters.
const VERIFIER_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh verifier from the system CSPRNG.
    pub fn generate() -> anyhow::Result<Self> {
        let mut bytes = [0u8; VERIFIER_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| anyhow!("System RNG unavailable"))?;

        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

/// S256 challenge: base64url(SHA-256(verifier)) without padding.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
