// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`AuthBackend`] over the dashboard REST API.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::backend::{oauth, AuthBackend};
use crate::config::{DashConfig, IdpEndpoints};
use crate::session::credential::{Credential, CredentialSource, Grant};
use crate::session::identity::Identity;
use crate::session::pkce::CodeExchange;

/// TTL assumed when the backend does not declare one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    remember_me: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    token: String,
    #[serde(default, alias = "expires_in")]
    expires_in: Option<u64>,
    #[serde(default, alias = "refresh_token")]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<Identity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "accessToken", alias = "access_token")]
    token: Option<String>,
    #[serde(default, alias = "expires_in")]
    expires_in: Option<u64>,
    #[serde(default, alias = "refresh_token")]
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogoutResponse {
    #[serde(default, alias = "logout_url")]
    logout_url: Option<String>,
}

/// Production backend: `/auth/*` and `/user/me` on the dashboard API, plus the
/// Identity Provider token endpoint for SSO-issued credentials.
pub struct HttpAuthBackend {
    http: reqwest::Client,
    config: DashConfig,
    idp: Option<IdpEndpoints>,
}

impl HttpAuthBackend {
    pub fn new(config: &DashConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { http, config: config.clone(), idp: config.identity_provider() }
    }

    async fn do_login(&self, username: &str, password: &str) -> anyhow::Result<Grant> {
        let resp = self
            .http
            .post(self.config.api_endpoint("/auth/login"))
            .json(&LoginRequest { username, password, remember_me: self.config.remember_me })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("login rejected ({status}): {text}");
        }

        let body: LoginResponse = resp.json().await?;
        Ok(Grant {
            token: body.token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in.map(Duration::from_secs).unwrap_or(DEFAULT_TTL),
            user: body.user,
        })
    }

    async fn do_refresh(&self, credential: &Credential) -> anyhow::Result<Grant> {
        match credential.source() {
            CredentialSource::Backend => self.refresh_backend(credential).await,
            CredentialSource::IdentityProvider => {
                let idp = self
                    .idp
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("identity provider not configured"))?;
                let refresh_token = credential
                    .refresh_token()
                    .ok_or_else(|| anyhow::anyhow!("no refresh token for SSO session"))?;
                let token =
                    oauth::refresh_token(&self.http, &idp.token, &idp.client_id, refresh_token)
                        .await?;
                Ok(token.into())
            }
        }
    }

    async fn refresh_backend(&self, credential: &Credential) -> anyhow::Result<Grant> {
        let resp = self
            .http
            .post(self.config.api_endpoint("/auth/refresh"))
            .bearer_auth(credential.token())
            .json(&RefreshRequest { refresh_token: credential.refresh_token() })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("refresh rejected ({status}): {text}");
        }

        let body: RefreshResponse = resp.json().await?;
        if !body.success.unwrap_or(body.token.is_some()) {
            anyhow::bail!("refresh declined by backend");
        }
        // No token in the response extends the current one.
        let token = body.token.unwrap_or_else(|| credential.token().to_owned());
        Ok(Grant {
            token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in.map(Duration::from_secs).unwrap_or(DEFAULT_TTL),
            user: None,
        })
    }

    async fn do_logout(&self, credential: &Credential) -> anyhow::Result<Option<String>> {
        if credential.source() == CredentialSource::IdentityProvider {
            if let (Some(idp), Some(rt)) = (self.idp.as_ref(), credential.refresh_token()) {
                oauth::end_session(&self.http, &idp.end_session, &idp.client_id, rt).await?;
            }
            return Ok(None);
        }

        let resp = self
            .http
            .post(self.config.api_endpoint("/auth/logout"))
            .bearer_auth(credential.token())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("logout rejected ({status})");
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let body: LogoutResponse = serde_json::from_slice(&bytes).unwrap_or_default();
        Ok(body.logout_url.filter(|u| !u.is_empty()))
    }

    async fn do_whoami(&self, token: &str) -> anyhow::Result<Identity> {
        let resp = self
            .http
            .get(self.config.api_endpoint("/user/me"))
            .bearer_auth(token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("identity lookup rejected ({status})");
        }

        let identity: Identity = resp.json().await?;
        Ok(identity)
    }

    async fn do_exchange(&self, exchange: &CodeExchange, code: &str) -> anyhow::Result<Grant> {
        let token = oauth::exchange_code(&self.http, exchange, code).await?;
        Ok(token.into())
    }
}

impl AuthBackend for HttpAuthBackend {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Grant>> {
        Box::pin(self.do_login(username, password))
    }

    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, anyhow::Result<Grant>> {
        Box::pin(self.do_refresh(credential))
    }

    fn logout<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
        Box::pin(self.do_logout(credential))
    }

    fn whoami<'a>(&'a self, token: &'a str) -> BoxFuture<'a, anyhow::Result<Identity>> {
        Box::pin(self.do_whoami(token))
    }

    fn exchange_code<'a>(
        &'a self,
        exchange: &'a CodeExchange,
        code: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Grant>> {
        Box::pin(self.do_exchange(exchange, code))
    }
}
