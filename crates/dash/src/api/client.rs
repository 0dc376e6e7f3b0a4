// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request pipeline: attaches the session's bearer token and recovers from a
//! rejected token with at most one refresh and one retry.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::DashConfig;
use crate::error::ApiError;
use crate::session::SessionCoordinator;

/// HTTP client for the dashboard backend, bound to one session.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    session: Arc<SessionCoordinator>,
}

impl ApiClient {
    pub fn new(config: &DashConfig, session: Arc<SessionCoordinator>) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { base_url: config.api_url.trim_end_matches('/').to_owned(), client, session }
    }

    pub fn session(&self) -> &Arc<SessionCoordinator> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// Send `req` through the pipeline and return the successful response.
    pub async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let replay = req.try_clone();
        let sent = self.session.bearer_token();
        let resp = apply_auth(req, sent.as_deref()).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp).await;
        }

        let Some(sent) = sent else {
            return Err(ApiError::Unauthorized);
        };
        let Some(replay) = replay else {
            tracing::debug!("401 on a request that cannot be replayed");
            return Err(ApiError::Unauthorized);
        };

        if !self.session.refresh_after_rejection(&sent).await.is_refreshed() {
            return Err(ApiError::SessionExpired);
        }

        let current = self.session.bearer_token();
        let resp = apply_auth(replay, current.as_deref()).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %resp.url(), "request rejected again after refresh");
            if let Some(current) = current {
                self.session.expire(&current);
            }
            return Err(ApiError::Unauthorized);
        }
        check_status(resp).await
    }

    /// Send `req` and decode the JSON body.
    pub async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send `req` and discard the body.
    pub async fn execute(&self, req: RequestBuilder) -> Result<(), ApiError> {
        self.send(req).await.map(drop)
    }
}

fn apply_auth(req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => req.bearer_auth(token),
        None => req,
    }
}

async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::from_status(status.as_u16(), &body))
}
