// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fakes for integration tests: an in-memory auth backend, a
//! navigator that records, and a bearer-checking resource server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use fleetdash::backend::AuthBackend;
use fleetdash::config::DashConfig;
use fleetdash::navigate::{Navigation, Navigator};
use fleetdash::session::credential::{Credential, Grant};
use fleetdash::session::identity::Identity;
use fleetdash::session::pkce::CodeExchange;
use fleetdash::session::{SessionCoordinator, SessionSettings};

pub const LOGIN_URL: &str = "http://dash.test/login";

static CRYPTO: Once = Once::new();

/// Install the rustls crypto provider (reqwest needs one even for plain HTTP).
pub fn install_crypto() {
    CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub fn alice() -> Identity {
    Identity {
        subject: "u-1".to_owned(),
        username: "alice".to_owned(),
        email: Some("alice@example.com".to_owned()),
        name: None,
        roles: vec!["admin".to_owned(), "viewer".to_owned()],
    }
}

/// In-memory [`AuthBackend`] that issues `token-N` and tracks the one token
/// the resource server currently accepts.
pub struct FakeBackend {
    pub ttl: Mutex<Duration>,
    pub valid_token: Arc<Mutex<String>>,
    pub issued: AtomicU32,
    pub login_calls: AtomicU32,
    pub refresh_calls: AtomicU32,
    pub logout_calls: AtomicU32,
    pub fail_refresh: AtomicBool,
    pub logout_url: Mutex<Option<String>>,
    /// When set, each refresh waits for one permit.
    gate: Option<Semaphore>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// Refreshes block until [`release`](Self::release) hands out a permit.
    pub fn gated() -> Arc<Self> {
        Arc::new(Self::build(Some(Semaphore::new(0))))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        Self {
            ttl: Mutex::new(Duration::from_secs(3600)),
            valid_token: Arc::new(Mutex::new(String::new())),
            issued: AtomicU32::new(0),
            login_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            logout_calls: AtomicU32::new(0),
            fail_refresh: AtomicBool::new(false),
            logout_url: Mutex::new(None),
            gate,
        }
    }

    pub fn with_ttl(self: Arc<Self>, ttl: Duration) -> Arc<Self> {
        *self.ttl.lock() = ttl;
        self
    }

    pub fn release(&self, permits: usize) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn refreshes(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Make the resource server reject every token issued so far.
    pub fn revoke_tokens(&self) {
        *self.valid_token.lock() = "revoked".to_owned();
    }

    fn issue(&self) -> Grant {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("token-{n}");
        *self.valid_token.lock() = token.clone();
        Grant {
            token,
            refresh_token: Some(format!("refresh-{n}")),
            expires_in: *self.ttl.lock(),
            user: Some(alice()),
        }
    }
}

impl AuthBackend for FakeBackend {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Grant>> {
        Box::pin(async move {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if username == "alice" && password == "correct-pw" {
                Ok(self.issue())
            } else {
                anyhow::bail!("invalid username or password")
            }
        })
    }

    fn refresh<'a>(&'a self, _credential: &'a Credential) -> BoxFuture<'a, anyhow::Result<Grant>> {
        Box::pin(async move {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ref gate) = self.gate {
                gate.acquire().await?.forget();
            }
            if self.fail_refresh.load(Ordering::SeqCst) {
                anyhow::bail!("refresh rejected");
            }
            Ok(self.issue())
        })
    }

    fn logout<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> BoxFuture<'a, anyhow::Result<Option<String>>> {
        Box::pin(async move {
            self.logout_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.logout_url.lock().clone())
        })
    }

    fn whoami<'a>(&'a self, token: &'a str) -> BoxFuture<'a, anyhow::Result<Identity>> {
        Box::pin(async move {
            if *self.valid_token.lock() == token {
                Ok(alice())
            } else {
                anyhow::bail!("token not accepted")
            }
        })
    }

    fn exchange_code<'a>(
        &'a self,
        _exchange: &'a CodeExchange,
        code: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Grant>> {
        Box::pin(async move {
            if code == "good-code" {
                Ok(self.issue())
            } else {
                anyhow::bail!("invalid_grant")
            }
        })
    }
}

/// Navigator that remembers every request.
#[derive(Default)]
pub struct RecordingNavigator {
    pub seen: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Navigation> {
        self.seen.lock().clone()
    }

    pub fn logins(&self) -> usize {
        self.seen.lock().iter().filter(|n| matches!(n, Navigation::Login(_))).count()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, to: Navigation) {
        self.seen.lock().push(to);
    }
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        refresh_margin: Duration::from_secs(60),
        login_url: LOGIN_URL.to_owned(),
        redirect_uri: "http://127.0.0.1:8976/callback".to_owned(),
        identity_provider: None,
    }
}

pub fn sso_settings() -> SessionSettings {
    let mut config = DashConfig::for_api("http://api.test");
    config.idp_url = Some("http://idp.test".to_owned());
    config.login_url = LOGIN_URL.to_owned();
    SessionSettings::from(&config)
}

pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub navigator: Arc<RecordingNavigator>,
    pub session: Arc<SessionCoordinator>,
}

impl Harness {
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        Self::with_settings(backend, settings())
    }

    pub fn with_settings(backend: Arc<FakeBackend>, settings: SessionSettings) -> Self {
        install_crypto();
        let navigator = RecordingNavigator::new();
        let session = SessionCoordinator::new(settings, backend.clone(), navigator.clone());
        Self { backend, navigator, session }
    }
}

/// Wait until `n` callers are parked on the pending refresh.
pub async fn wait_for_waiters(session: &SessionCoordinator, n: usize) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.snapshot().refresh_waiters < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await?;
    Ok(())
}

// -- Resource server ----------------------------------------------------------

/// Requests the resource server saw, with the bearer token each carried.
#[derive(Default)]
pub struct Hits {
    pub tokens: Mutex<Vec<Option<String>>>,
}

impl Hits {
    pub fn count(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn sent_with(&self, token: &str) -> usize {
        self.tokens.lock().iter().filter(|t| t.as_deref() == Some(token)).count()
    }
}

#[derive(Clone)]
struct ResourceState {
    valid_token: Arc<Mutex<String>>,
    hits: Arc<Hits>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

async fn applications(State(s): State<ResourceState>, headers: HeaderMap) -> impl IntoResponse {
    let token = bearer(&headers);
    s.hits.tokens.lock().push(token.clone());
    if token.as_deref() == Some(s.valid_token.lock().as_str()) {
        let body = serde_json::json!([
            { "id": "keycloak", "name": "Keycloak SSO", "status": "Running", "type": "Authentication" },
            { "id": "grafana", "name": "Grafana", "status": "Running", "type": "Monitoring" },
        ]);
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "message": "token expired" })))
            .into_response()
    }
}

async fn always_unauthorized(State(s): State<ResourceState>, headers: HeaderMap) -> StatusCode {
    s.hits.tokens.lock().push(bearer(&headers));
    StatusCode::UNAUTHORIZED
}

/// Serve `/applications` (bearer-checked) and `/locked` (always 401) on an
/// ephemeral port. Returns the base URL and the hit log.
pub async fn spawn_resource_server(
    valid_token: Arc<Mutex<String>>,
) -> anyhow::Result<(String, Arc<Hits>)> {
    let hits = Arc::new(Hits::default());
    let router = Router::new()
        .route("/applications", get(applications))
        .route("/locked", get(always_unauthorized))
        .with_state(ResourceState { valid_token, hits: hits.clone() });
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((format!("http://{addr}"), hits))
}

/// Raw value of `key` in the query string of `url`.
pub fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| match pair.split_once('=') {
        Some((k, v)) if k == key => Some(v.to_owned()),
        _ => None,
    })
}
