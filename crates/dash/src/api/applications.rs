// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployed applications managed through the dashboard backend.

use serde::{Deserialize, Serialize};

use crate::api::client::ApiClient;
use crate::encode;
use crate::error::ApiError;

// -- Records ------------------------------------------------------------------

/// One deployed application. Fields the backend omits fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub image_url: String,
    pub deployed_at: String,
    pub cpu: String,
    pub memory: String,
    pub storage: String,
    pub pod_count: u32,
    /// Percent.
    pub cpu_usage: f64,
    /// Percent.
    pub memory_usage: f64,
    pub uptime: String,
    pub last_restart: String,
    pub health_status: String,
    pub ports: Vec<Port>,
    pub config_files: Vec<ConfigFile>,
    pub events: Vec<AppEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Port {
    pub port: u16,
    pub target_port: u16,
    pub protocol: String,
    pub service: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub name: String,
    pub path: String,
    pub size: String,
    pub modified: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub timestamp: String,
}

/// Body of `POST /applications`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_count: Option<u32>,
}

/// Type filter meaning "no filter".
pub const ALL_TYPES: &str = "All";

// -- Service ------------------------------------------------------------------

/// Application CRUD, every call routed through the session-aware pipeline.
#[derive(Clone)]
pub struct ApplicationService {
    client: ApiClient,
}

impl ApplicationService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `GET /applications`
    pub async fn list(&self) -> Result<Vec<Application>, ApiError> {
        self.client.json(self.client.get("/applications")).await
    }

    /// `GET /applications/{id}`
    pub async fn get(&self, id: &str) -> Result<Application, ApiError> {
        let path = format!("/applications/{}", encode::component(id));
        self.client.json(self.client.get(&path)).await
    }

    /// `GET /applications/search?term&type`
    ///
    /// An empty term with no type filter lists everything instead.
    pub async fn search(&self, term: &str, kind: &str) -> Result<Vec<Application>, ApiError> {
        let term = term.trim();
        if term.is_empty() && (kind.is_empty() || kind == ALL_TYPES) {
            return self.list().await;
        }
        let req = self.client.get("/applications/search").query(&[("term", term), ("type", kind)]);
        self.client.json(req).await
    }

    /// `POST /applications`
    pub async fn deploy(&self, request: &DeployRequest) -> Result<Application, ApiError> {
        if request.name.trim().is_empty() {
            return Err(ApiError::BadRequest("application name is required".to_owned()));
        }
        self.client.json(self.client.post("/applications").json(request)).await
    }

    /// `POST /applications/{id}/restart`
    pub async fn restart(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/applications/{}/restart", encode::component(id));
        self.client.execute(self.client.post(&path)).await
    }

    /// `DELETE /applications/{id}`
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let path = format!("/applications/{}", encode::component(id));
        self.client.execute(self.client.delete(&path)).await
    }
}
