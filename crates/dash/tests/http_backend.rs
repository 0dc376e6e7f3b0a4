// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `HttpAuthBackend` against a mock dashboard backend.

mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use fleetdash::backend::{AuthBackend, HttpAuthBackend};
use fleetdash::command::{self, Cli, Command};
use fleetdash::config::DashConfig;
use fleetdash::session::credential::{Credential, CredentialSource, Grant};
use fleetdash::session::persist::{self, PersistedSession};
use fleetdash::session::{LoginOutcome, SessionCoordinator};

use support::RecordingNavigator;

/// What the mock returns from `/auth/refresh` and `/auth/logout`, and what it
/// has been sent.
#[derive(Default)]
struct MockState {
    refresh_reply: Mutex<Value>,
    logout_reply: Mutex<Option<Value>>,
    refresh_seen: Mutex<Vec<(Option<String>, Value)>>,
    login_seen: Mutex<Vec<Value>>,
    logout_seen: Mutex<Vec<Option<String>>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

async fn login(State(s): State<Arc<MockState>>, Json(body): Json<Value>) -> impl IntoResponse {
    s.login_seen.lock().push(body.clone());
    if body["username"] == "alice" && body["password"] == "correct-pw" {
        let reply = json!({
            "token": "backend-token-1",
            "expiresIn": 900,
            "refreshToken": "rt-1",
            "user": { "id": "u-1", "username": "alice", "roles": ["admin"] },
        });
        (StatusCode::OK, Json(reply))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "invalid credentials" })))
    }
}

async fn refresh(
    State(s): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    s.refresh_seen.lock().push((bearer(&headers), body));
    Json(s.refresh_reply.lock().clone())
}

async fn logout(State(s): State<Arc<MockState>>, headers: HeaderMap) -> axum::response::Response {
    s.logout_seen.lock().push(bearer(&headers));
    match s.logout_reply.lock().clone() {
        Some(body) => Json(body).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn me(headers: HeaderMap) -> impl IntoResponse {
    match bearer(&headers).as_deref() {
        Some("backend-token-1") => {
            (StatusCode::OK, Json(json!({ "id": "u-1", "username": "alice", "roles": ["admin"] })))
        }
        _ => (StatusCode::UNAUTHORIZED, Json(json!({ "message": "expired" }))),
    }
}

async fn spawn_backend(state: Arc<MockState>) -> anyhow::Result<DashConfig> {
    support::install_crypto();
    let router = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/user/me", get(me))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(DashConfig::for_api(format!("http://{addr}/api/v1")))
}

fn issued(token: &str) -> anyhow::Result<Credential> {
    Credential::issue(
        Grant {
            token: token.to_owned(),
            refresh_token: Some("rt-1".to_owned()),
            expires_in: Duration::from_secs(900),
            user: None,
        },
        CredentialSource::Backend,
    )
}

#[tokio::test]
async fn login_parses_grant() -> anyhow::Result<()> {
    let config = spawn_backend(Arc::new(MockState::default())).await?;
    let backend = HttpAuthBackend::new(&config);

    let grant = backend.login("alice", "correct-pw").await?;
    assert_eq!(grant.token, "backend-token-1");
    assert_eq!(grant.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(grant.expires_in, Duration::from_secs(900));
    let user = grant.user.ok_or_else(|| anyhow::anyhow!("no user"))?;
    assert_eq!(user.username, "alice");
    assert_eq!(user.subject, "u-1");

    assert!(backend.login("alice", "wrong-pw").await.is_err());
    Ok(())
}

#[tokio::test]
async fn login_sends_remember_me() -> anyhow::Result<()> {
    let state = Arc::new(MockState::default());
    let mut config = spawn_backend(state.clone()).await?;
    HttpAuthBackend::new(&config).login("alice", "correct-pw").await?;
    config.remember_me = true;
    HttpAuthBackend::new(&config).login("alice", "correct-pw").await?;

    let seen = state.login_seen.lock().clone();
    let flags: Vec<&Value> = seen.iter().map(|b| &b["rememberMe"]).collect();
    assert_eq!(flags, vec![&json!(false), &json!(true)]);
    Ok(())
}

#[tokio::test]
async fn refresh_sends_bearer_and_refresh_token() -> anyhow::Result<()> {
    let state = Arc::new(MockState::default());
    *state.refresh_reply.lock() = json!({ "success": true, "token": "backend-token-2", "expiresIn": 600 });
    let backend = HttpAuthBackend::new(&spawn_backend(state.clone()).await?);

    let grant = backend.refresh(&issued("backend-token-1")?).await?;
    assert_eq!(grant.token, "backend-token-2");
    assert_eq!(grant.expires_in, Duration::from_secs(600));

    let seen = state.refresh_seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("backend-token-1"));
    assert_eq!(seen[0].1, json!({ "refreshToken": "rt-1" }));
    Ok(())
}

#[tokio::test]
async fn refresh_without_token_extends_current_one() -> anyhow::Result<()> {
    let state = Arc::new(MockState::default());
    *state.refresh_reply.lock() = json!({ "success": true, "expiresIn": 1200 });
    let backend = HttpAuthBackend::new(&spawn_backend(state).await?);

    let grant = backend.refresh(&issued("backend-token-1")?).await?;
    assert_eq!(grant.token, "backend-token-1");
    assert_eq!(grant.expires_in, Duration::from_secs(1200));
    Ok(())
}

#[tokio::test]
async fn refresh_declined_is_an_error() -> anyhow::Result<()> {
    let state = Arc::new(MockState::default());
    *state.refresh_reply.lock() = json!({ "success": false });
    let backend = HttpAuthBackend::new(&spawn_backend(state).await?);

    assert!(backend.refresh(&issued("backend-token-1")?).await.is_err());
    Ok(())
}

#[tokio::test]
async fn logout_reports_server_url() -> anyhow::Result<()> {
    let state = Arc::new(MockState::default());
    let backend = HttpAuthBackend::new(&spawn_backend(state.clone()).await?);
    let credential = issued("backend-token-1")?;

    assert_eq!(backend.logout(&credential).await?, None);

    *state.logout_reply.lock() = Some(json!({ "logoutUrl": "http://idp.test/end" }));
    assert_eq!(backend.logout(&credential).await?.as_deref(), Some("http://idp.test/end"));
    Ok(())
}

#[tokio::test]
async fn whoami_requires_accepted_token() -> anyhow::Result<()> {
    let backend = HttpAuthBackend::new(&spawn_backend(Arc::new(MockState::default())).await?);

    let identity = backend.whoami("backend-token-1").await?;
    assert!(identity.has_role("admin"));
    assert!(backend.whoami("stale").await.is_err());
    Ok(())
}

#[tokio::test]
async fn coordinator_logs_in_over_http() -> anyhow::Result<()> {
    let config = spawn_backend(Arc::new(MockState::default())).await?;
    let session = SessionCoordinator::new(
        (&config).into(),
        Arc::new(HttpAuthBackend::new(&config)),
        RecordingNavigator::new(),
    );

    assert_eq!(session.login("alice", "correct-pw").await, LoginOutcome::Success);
    assert!(session.has_role("admin"));
    let snap = session.snapshot();
    assert_eq!(snap.token.as_deref(), Some("backend-token-1"));

    let failed = session.login("alice", "wrong-pw").await;
    assert!(matches!(failed, LoginOutcome::Failed { .. }));
    Ok(())
}

#[tokio::test]
async fn logout_command_revokes_stale_saved_session() -> anyhow::Result<()> {
    let state = Arc::new(MockState::default());
    let dir = tempfile::tempdir()?;
    let mut config = spawn_backend(state.clone()).await?;
    config.state_dir = Some(dir.path().to_path_buf());
    let path = command::session_file(&config);

    // Expired and without a refresh token, so it would never resume.
    let saved = PersistedSession {
        token: "backend-token-0".to_owned(),
        refresh_token: None,
        source: CredentialSource::Backend,
        expires_at: 1,
        identity: None,
    };
    persist::save(&path, &saved)?;

    command::run(Cli { config, log_json: false, command: Command::Logout }).await?;

    assert_eq!(*state.logout_seen.lock(), vec![Some("backend-token-0".to_owned())]);
    assert!(!path.exists());
    Ok(())
}
