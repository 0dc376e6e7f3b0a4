// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authorization code + PKCE (RFC 7636) helpers for the SSO redirect login.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::IdpEndpoints;
use crate::encode;

/// Scopes requested from the Identity Provider.
pub const SCOPE: &str = "openid profile email";

/// Generate a PKCE code verifier (43-128 char URL-safe random string).
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute code_challenge = base64url_nopad(sha256(verifier)).
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random `state` parameter.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the full authorization URL with PKCE parameters.
pub fn build_auth_url(
    auth_url: &str,
    client_id: &str,
    redirect_uri: &str,
    code_challenge: &str,
    state: &str,
) -> String {
    let query = encode::query(&[
        ("client_id", client_id),
        ("response_type", "code"),
        ("redirect_uri", redirect_uri),
        ("scope", SCOPE),
        ("code_challenge", code_challenge),
        ("code_challenge_method", "S256"),
        ("state", state),
    ]);
    format!("{auth_url}?{query}")
}

/// Everything needed to redeem an authorization code once the Identity
/// Provider redirects back.
#[derive(Debug, Clone)]
pub struct CodeExchange {
    pub code_verifier: String,
    pub redirect_uri: String,
    pub token_url: String,
    pub client_id: String,
}

/// A freshly started redirect login: the URL to visit and the state that
/// identifies it on the way back.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub exchange: CodeExchange,
}

impl AuthorizationRequest {
    pub fn new(idp: &IdpEndpoints, redirect_uri: &str) -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = compute_code_challenge(&code_verifier);
        let state = generate_state();
        let url = build_auth_url(
            &idp.authorization,
            &idp.client_id,
            redirect_uri,
            &code_challenge,
            &state,
        );
        Self {
            url,
            state,
            exchange: CodeExchange {
                code_verifier,
                redirect_uri: redirect_uri.to_owned(),
                token_url: idp.token.clone(),
                client_id: idp.client_id.clone(),
            },
        }
    }
}

#[cfg(test)]
#[path = "pkce_tests.rs"]
mod tests;
