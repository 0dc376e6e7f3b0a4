// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the dashboard client.
#[derive(Debug, Clone, clap::Args)]
pub struct DashConfig {
    /// Base URL of the dashboard backend API.
    #[arg(long, default_value = "http://localhost:8080/api/v1", env = "FLEETDASH_API_URL")]
    pub api_url: String,

    /// Identity Provider base URL. If unset, SSO login is disabled.
    #[arg(long, env = "FLEETDASH_IDP_URL")]
    pub idp_url: Option<String>,

    /// Identity Provider realm.
    #[arg(long, default_value = "fleet", env = "FLEETDASH_IDP_REALM")]
    pub idp_realm: String,

    /// OAuth client id registered with the Identity Provider.
    #[arg(long, default_value = "dashboard-client", env = "FLEETDASH_IDP_CLIENT_ID")]
    pub idp_client_id: String,

    /// Local login surface to send the user to when the session ends.
    #[arg(long, default_value = "http://localhost:3000/login", env = "FLEETDASH_LOGIN_URL")]
    pub login_url: String,

    /// Seconds before expiry at which the proactive refresh fires.
    #[arg(long, default_value_t = 60, env = "FLEETDASH_REFRESH_MARGIN_SECS")]
    pub refresh_margin_secs: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, env = "FLEETDASH_TIMEOUT_SECS")]
    pub timeout_secs: u64,

    /// Port for the local SSO callback listener.
    #[arg(long, default_value_t = 8976, env = "FLEETDASH_CALLBACK_PORT")]
    pub callback_port: u16,

    /// Directory for the persisted session. Falls back to the XDG state dir.
    #[arg(long, env = "FLEETDASH_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Ask the backend for a long-lived session on password login.
    #[arg(long, env = "FLEETDASH_REMEMBER_ME")]
    pub remember_me: bool,
}

impl DashConfig {
    /// Config pointing at `api_url` with every other field at its default.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            idp_url: None,
            idp_realm: "fleet".to_owned(),
            idp_client_id: "dashboard-client".to_owned(),
            login_url: "http://localhost:3000/login".to_owned(),
            refresh_margin_secs: 60,
            timeout_secs: 30,
            callback_port: 8976,
            state_dir: None,
            remember_me: false,
        }
    }

    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backend URL for `path`, tolerating a trailing slash on the base.
    pub fn api_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    /// Redirect URI the Identity Provider sends the browser back to.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.callback_port)
    }

    /// Resolved Identity Provider endpoints, or `None` when SSO is not configured.
    pub fn identity_provider(&self) -> Option<IdpEndpoints> {
        let base = self.idp_url.as_deref()?.trim_end_matches('/');
        let oidc = format!("{base}/realms/{}/protocol/openid-connect", self.idp_realm);
        Some(IdpEndpoints {
            authorization: format!("{oidc}/auth"),
            token: format!("{oidc}/token"),
            end_session: format!("{oidc}/logout"),
            client_id: self.idp_client_id.clone(),
        })
    }

    /// Resolve the state directory for the persisted session.
    ///
    /// Checks `--state-dir`/`FLEETDASH_STATE_DIR`, then `$XDG_STATE_HOME/fleetdash`,
    /// then `$HOME/.local/state/fleetdash`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("fleetdash");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/fleetdash");
        }
        PathBuf::from(".fleetdash")
    }
}

/// OpenID Connect endpoints of a Keycloak-style realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpEndpoints {
    pub authorization: String,
    pub token: String,
    pub end_session: String,
    pub client_id: String,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
