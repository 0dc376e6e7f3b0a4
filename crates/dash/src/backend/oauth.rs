// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity Provider token endpoint calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::http::DEFAULT_TTL;
use crate::session::credential::Grant;
use crate::session::pkce::CodeExchange;

/// Standard OAuth2 token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl From<TokenResponse> for Grant {
    fn from(token: TokenResponse) -> Self {
        Grant {
            token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: match token.expires_in {
                0 => DEFAULT_TTL,
                secs => Duration::from_secs(secs),
            },
            user: None,
        }
    }
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    exchange: &CodeExchange,
    code: &str,
) -> anyhow::Result<TokenResponse> {
    let resp = client
        .post(&exchange.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", exchange.client_id.as_str()),
            ("code", code),
            ("redirect_uri", exchange.redirect_uri.as_str()),
            ("code_verifier", exchange.code_verifier.as_str()),
        ])
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("token exchange failed ({status}): {text}");
    }

    let token: TokenResponse = resp.json().await?;
    Ok(token)
}

/// Perform a single refresh-token grant.
pub async fn refresh_token(
    client: &reqwest::Client,
    token_url: &str,
    client_id: &str,
    refresh_token: &str,
) -> anyhow::Result<TokenResponse> {
    let resp = client
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("refresh failed ({status}): {text}");
    }

    let token: TokenResponse = resp.json().await?;
    Ok(token)
}

/// Revoke the Identity Provider session behind `refresh_token`.
pub async fn end_session(
    client: &reqwest::Client,
    end_session_url: &str,
    client_id: &str,
    refresh_token: &str,
) -> anyhow::Result<()> {
    let resp = client
        .post(end_session_url)
        .form(&[("client_id", client_id), ("refresh_token", refresh_token)])
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("end session failed ({status}): {text}");
    }
    Ok(())
}
