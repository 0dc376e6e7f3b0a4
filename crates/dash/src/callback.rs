// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot local listener for the SSO redirect (`GET /callback?code&state`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use askama::Template;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::session::{LoginOutcome, SessionCoordinator};

/// Query parameters the Identity Provider appends to the redirect URI.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Clone)]
pub struct CallbackState {
    session: Arc<SessionCoordinator>,
    outcome_tx: mpsc::Sender<LoginOutcome>,
}

/// Router serving `/callback`; each completed callback is reported on
/// `outcome_tx`.
pub fn build_router(
    session: Arc<SessionCoordinator>,
    outcome_tx: mpsc::Sender<LoginOutcome>,
) -> Router {
    Router::new()
        .route("/callback", get(callback))
        .layer(TraceLayer::new_for_http())
        .with_state(CallbackState { session, outcome_tx })
}

/// Page shown in the browser once the redirect lands. `message` is escaped.
#[derive(Template)]
#[template(path = "callback.html")]
struct CallbackPage<'a> {
    message: &'a str,
}

async fn callback(
    State(s): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let outcome = match params {
        CallbackParams { error: Some(error), error_description, .. } => {
            let reason = match error_description {
                Some(desc) => format!("{error}: {desc}"),
                None => error,
            };
            LoginOutcome::Failed { reason }
        }
        CallbackParams { code: Some(code), state: Some(state), .. } => {
            s.session.complete_redirect(&state, &code).await
        }
        _ => {
            return page(StatusCode::BAD_REQUEST, "Missing code or state.");
        }
    };

    let status = if outcome.is_success() { StatusCode::OK } else { StatusCode::UNAUTHORIZED };
    let body = match outcome {
        LoginOutcome::Success => "Signed in. You can close this window.".to_owned(),
        LoginOutcome::Failed { ref reason } => format!("Sign-in failed: {reason}"),
    };
    let _ = s.outcome_tx.try_send(outcome);
    page(status, &body)
}

fn page(status: StatusCode, message: &str) -> Response {
    match (CallbackPage { message }).render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "failed to render callback page");
            (status, message.to_owned()).into_response()
        }
    }
}

/// Serve the callback on `127.0.0.1:port` until the first completed redirect
/// or `timeout`, then shut the listener down.
pub async fn await_callback(
    session: Arc<SessionCoordinator>,
    port: u16,
    timeout: Duration,
) -> anyhow::Result<LoginOutcome> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
    serve_until_callback(listener, session, timeout).await
}

/// [`await_callback`] on an already bound listener.
pub async fn serve_until_callback(
    listener: TcpListener,
    session: Arc<SessionCoordinator>,
    timeout: Duration,
) -> anyhow::Result<LoginOutcome> {
    let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
    let router = build_router(session, outcome_tx);
    let shutdown = CancellationToken::new();
    tracing::debug!(addr = %listener.local_addr()?, "waiting for SSO callback");

    let server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await
        }
    });

    let outcome = tokio::time::timeout(timeout, outcome_rx.recv()).await;
    shutdown.cancel();
    if let Err(e) = server.await? {
        tracing::debug!(err = %e, "callback listener exited with error");
    }

    match outcome {
        Ok(Some(outcome)) => Ok(outcome),
        Ok(None) => anyhow::bail!("callback listener closed"),
        Err(_) => anyhow::bail!("timed out waiting for the SSO callback"),
    }
}
