// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session coordinator: owns the credential, runs login/logout, and funnels
//! every refresh (proactive or reactive) through one single-flight gate.

pub mod credential;
pub mod flight;
pub mod identity;
pub mod persist;
pub mod pkce;
pub mod timer;

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::backend::AuthBackend;
use crate::config::{DashConfig, IdpEndpoints};
use crate::encode;
use crate::navigate::{Navigation, Navigator};

use self::credential::{Credential, CredentialSource, Grant};
use self::flight::{Joined, RefreshFlight};
use self::identity::Identity;
use self::persist::PersistedSession;
use self::pkce::{AuthorizationRequest, CodeExchange};
use self::timer::{refresh_delay, ArmedTimer, RefreshTimer};

pub use self::flight::RefreshOutcome;

/// Coarse session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

/// Result of a login attempt. Failures carry a reason for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failed { reason: String },
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }
}

/// Events emitted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { user: String },
    Refreshed,
    RefreshFailed { error: String },
    /// The backend rejected a request even after a refresh.
    Expired,
    LoggedOut,
}

/// Read-only view of the session at one moment.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// Current token, present even when expired so it can be refreshed.
    pub token: Option<String>,
    pub expires_in: Option<Duration>,
    pub identity: Option<Identity>,
    /// When the proactive refresh fires, if one is scheduled.
    pub refresh_at: Option<Instant>,
    /// Callers waiting on an in-flight refresh (zero when none is pending).
    pub refresh_waiters: usize,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }
}

/// Settings the coordinator needs from [`DashConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub refresh_margin: Duration,
    pub login_url: String,
    pub redirect_uri: String,
    pub identity_provider: Option<IdpEndpoints>,
}

impl From<&DashConfig> for SessionSettings {
    fn from(config: &DashConfig) -> Self {
        Self {
            refresh_margin: config.refresh_margin(),
            login_url: config.login_url.clone(),
            redirect_uri: config.redirect_uri(),
            identity_provider: config.identity_provider(),
        }
    }
}

struct SessionInner {
    credential: Option<Credential>,
    flight: RefreshFlight,
    timer: RefreshTimer,
    /// Bumped whenever the credential is replaced or cleared outside a
    /// refresh flight. Every bump settles the pending flight, whose result is
    /// then discarded when it lands.
    generation: u64,
    /// The latest redirect login awaiting its callback. Starting another one
    /// replaces it.
    pending_auth: Option<PendingAuth>,
}

struct PendingAuth {
    state: String,
    exchange: CodeExchange,
}

/// Owner of the client's authentication state.
pub struct SessionCoordinator {
    inner: Mutex<SessionInner>,
    settings: SessionSettings,
    backend: Arc<dyn AuthBackend>,
    navigator: Arc<dyn Navigator>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionCoordinator {
    pub fn new(
        settings: SessionSettings,
        backend: Arc<dyn AuthBackend>,
        navigator: Arc<dyn Navigator>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            inner: Mutex::new(SessionInner {
                credential: None,
                flight: RefreshFlight::default(),
                timer: RefreshTimer::default(),
                generation: 0,
                pending_auth: None,
            }),
            settings,
            backend,
            navigator,
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    // -- Reads ----------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let live = inner.credential.as_ref().filter(|c| !c.is_expired());
        SessionSnapshot {
            state: if live.is_some() {
                SessionState::Authenticated
            } else {
                SessionState::Unauthenticated
            },
            token: inner.credential.as_ref().map(|c| c.token().to_owned()),
            expires_in: inner.credential.as_ref().map(Credential::expires_in),
            identity: live.and_then(|c| c.identity().cloned()),
            refresh_at: inner.timer.fires_at(),
            refresh_waiters: inner.flight.waiting(),
        }
    }

    /// True only with a non-empty, unexpired credential.
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().credential.as_ref().is_some_and(|c| !c.is_expired())
    }

    /// Token to attach to outgoing requests, expired or not.
    pub fn bearer_token(&self) -> Option<String> {
        self.inner.lock().credential.as_ref().map(|c| c.token().to_owned())
    }

    pub fn identity(&self) -> Option<Identity> {
        let inner = self.inner.lock();
        inner.credential.as_ref().filter(|c| !c.is_expired()).and_then(|c| c.identity().cloned())
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.identity().is_some_and(|id| id.has_role(role))
    }

    /// Credential in persistable form, if there is one.
    pub fn persisted(&self) -> Option<PersistedSession> {
        self.inner.lock().credential.as_ref().map(Credential::to_persisted)
    }

    // -- Login ----------------------------------------------------------------

    /// Direct login with a username and password.
    pub async fn login(self: &Arc<Self>, username: &str, password: &str) -> LoginOutcome {
        match self.backend.login(username, password).await {
            Ok(grant) => self.establish(grant, CredentialSource::Backend).await,
            Err(e) => {
                tracing::warn!(username, err = %e, "login failed");
                LoginOutcome::failed(e.to_string())
            }
        }
    }

    /// Start a redirect login: navigate to the Identity Provider and wait for
    /// [`complete_redirect`](Self::complete_redirect).
    ///
    /// Returns the authorization URL, or `None` if SSO is not configured.
    pub fn login_redirect(&self) -> Option<String> {
        let Some(idp) = self.settings.identity_provider.as_ref() else {
            tracing::warn!("redirect login requested but no identity provider is configured");
            return None;
        };
        let request = AuthorizationRequest::new(idp, &self.settings.redirect_uri);
        let pending = PendingAuth { state: request.state, exchange: request.exchange };
        if self.inner.lock().pending_auth.replace(pending).is_some() {
            tracing::debug!("earlier redirect login superseded");
        }
        self.navigator.navigate(Navigation::IdentityProvider(request.url.clone()));
        Some(request.url)
    }

    /// Finish a redirect login with the `state` and `code` from the callback.
    pub async fn complete_redirect(self: &Arc<Self>, state: &str, code: &str) -> LoginOutcome {
        let exchange = {
            let mut inner = self.inner.lock();
            match inner.pending_auth.take() {
                Some(pending) if pending.state == state => Some(pending.exchange),
                other => {
                    inner.pending_auth = other;
                    None
                }
            }
        };
        let Some(exchange) = exchange else {
            tracing::warn!("callback with unknown or expired authorization state");
            return LoginOutcome::failed("unknown or expired authorization state");
        };
        match self.backend.exchange_code(&exchange, code).await {
            Ok(grant) => self.establish(grant, CredentialSource::IdentityProvider).await,
            Err(e) => {
                tracing::warn!(err = %e, "authorization code exchange failed");
                LoginOutcome::failed(e.to_string())
            }
        }
    }

    /// Adopt a credential saved by a previous process.
    ///
    /// An unexpired credential is validated with the backend first; an expired
    /// one is refreshed if it carries a refresh token. Returns whether the
    /// session ended up authenticated.
    pub async fn resume(self: &Arc<Self>, persisted: &PersistedSession) -> bool {
        let Some(mut credential) = Credential::restore(persisted) else {
            return false;
        };

        if credential.is_expired() {
            if credential.refresh_token().is_none() {
                tracing::debug!("persisted session expired without refresh token");
                return false;
            }
            let orphaned = {
                let mut inner = self.inner.lock();
                inner.generation += 1;
                inner.credential = Some(credential);
                inner.flight.settle()
            };
            orphaned.resolve(RefreshOutcome::Failed);
            return self.refresh().await.is_refreshed();
        }

        match self.backend.whoami(credential.token()).await {
            Ok(identity) => {
                credential.set_identity(identity);
                self.install(credential);
                true
            }
            Err(e) => {
                tracing::debug!(err = %e, "persisted session no longer accepted");
                false
            }
        }
    }

    /// Adopt a saved credential as-is, without validating or refreshing it,
    /// so that [`logout`](Self::logout) can still revoke it.
    pub fn adopt(&self, persisted: &PersistedSession) -> bool {
        let Some(credential) = Credential::restore(persisted) else {
            return false;
        };
        let orphaned = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.credential = Some(credential);
            inner.flight.settle()
        };
        orphaned.resolve(RefreshOutcome::Failed);
        true
    }

    /// Validate a grant, resolve its identity, and make it current.
    async fn establish(self: &Arc<Self>, grant: Grant, source: CredentialSource) -> LoginOutcome {
        let mut credential = match Credential::issue(grant, source) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(err = %e, "login returned an unusable credential");
                return LoginOutcome::failed(e.to_string());
            }
        };

        if credential.identity().is_none() {
            match self.backend.whoami(credential.token()).await {
                Ok(identity) => credential.set_identity(identity),
                Err(e) => tracing::debug!(err = %e, "identity lookup after login failed"),
            }
        }

        self.install(credential);
        LoginOutcome::Success
    }

    fn install(self: &Arc<Self>, credential: Credential) {
        let user = credential.identity().map(|id| id.label().to_owned()).unwrap_or_default();
        let ttl = credential.expires_in();
        let orphaned = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.credential = Some(credential);
            self.schedule_refresh(&mut inner, ttl);
            inner.flight.settle()
        };
        // Callers parked on a superseded refresh can retry with the new token.
        orphaned.resolve(RefreshOutcome::Refreshed);
        tracing::info!(%user, expires_in_secs = ttl.as_secs(), "session established");
        let _ = self.event_tx.send(SessionEvent::LoggedIn { user });
    }

    // -- Logout ---------------------------------------------------------------

    /// End the session. Always leaves the coordinator `Unauthenticated`.
    pub async fn logout(self: &Arc<Self>) {
        let (previous, orphaned) = {
            let mut inner = self.inner.lock();
            inner.timer.cancel();
            inner.generation += 1;
            inner.pending_auth = None;
            (inner.credential.take(), inner.flight.settle())
        };
        orphaned.resolve(RefreshOutcome::Failed);

        let server_url = match previous {
            Some(ref credential) => match self.backend.logout(credential).await {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(err = %e, "server-side logout failed, continuing");
                    None
                }
            },
            None => None,
        };

        let source = previous.as_ref().map(Credential::source);
        let target = server_url.unwrap_or_else(|| self.logout_target(source));
        tracing::info!("session ended");
        let _ = self.event_tx.send(SessionEvent::LoggedOut);
        self.navigator.navigate(Navigation::Logout(target));
    }

    fn logout_target(&self, source: Option<CredentialSource>) -> String {
        match (source, self.settings.identity_provider.as_ref()) {
            (Some(CredentialSource::IdentityProvider), Some(idp)) => format!(
                "{}?{}",
                idp.end_session,
                encode::query(&[
                    ("client_id", idp.client_id.as_str()),
                    ("post_logout_redirect_uri", self.settings.login_url.as_str()),
                ])
            ),
            _ => self.settings.login_url.clone(),
        }
    }

    /// End the session because the backend rejected `rejected` even after a
    /// refresh. No-op once `rejected` is no longer the current token.
    pub fn expire(&self, rejected: &str) {
        let orphaned = {
            let mut inner = self.inner.lock();
            if !matches!(inner.credential.as_ref(), Some(c) if c.token() == rejected) {
                return;
            }
            inner.credential = None;
            inner.timer.cancel();
            inner.generation += 1;
            inner.flight.settle()
        };
        orphaned.resolve(RefreshOutcome::Failed);
        tracing::warn!("credential rejected after refresh, session ended");
        let _ = self.event_tx.send(SessionEvent::Expired);
        self.navigator.navigate(Navigation::Login(self.settings.login_url.clone()));
    }

    // -- Refresh --------------------------------------------------------------

    /// Refresh the credential, sharing any refresh already in flight.
    pub async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        self.refresh_inner(None).await
    }

    /// Refresh after the backend rejected `rejected`.
    ///
    /// If a completed refresh already replaced that token, returns
    /// `Refreshed` without another network call so the caller retries with
    /// the current credential.
    pub async fn refresh_after_rejection(self: &Arc<Self>, rejected: &str) -> RefreshOutcome {
        self.refresh_inner(Some(rejected)).await
    }

    async fn refresh_inner(self: &Arc<Self>, rejected: Option<&str>) -> RefreshOutcome {
        let rx = {
            let mut inner = self.inner.lock();
            let Some(credential) = inner.credential.clone() else {
                return RefreshOutcome::Failed;
            };
            if let Some(rejected) = rejected {
                if !inner.flight.is_pending()
                    && credential.token() != rejected
                    && !credential.is_expired()
                {
                    return RefreshOutcome::Refreshed;
                }
            }
            match inner.flight.join() {
                Joined::Waiting(rx) => rx,
                Joined::Started(rx) => {
                    let generation = inner.generation;
                    tracing::debug!("starting credential refresh");
                    tokio::spawn(Arc::clone(self).run_flight(credential, generation));
                    rx
                }
            }
        };
        rx.await.unwrap_or(RefreshOutcome::Failed)
    }

    /// The one network refresh of a flight. Runs detached so a dropped caller
    /// cannot strand the waiters.
    async fn run_flight(self: Arc<Self>, credential: Credential, generation: u64) {
        let result =
            self.backend.refresh(&credential).await.and_then(|grant| credential.renew(grant));

        let (settled, result) = {
            let mut inner = self.inner.lock();
            // Login or logout already settled this flight's waiters.
            if inner.generation != generation {
                tracing::debug!("refresh landed after the session changed, discarding");
                return;
            }
            let settled = inner.flight.settle();
            match result {
                Ok(next) => {
                    let ttl = next.expires_in();
                    inner.credential = Some(next);
                    self.schedule_refresh(&mut inner, ttl);
                    (settled, Ok(()))
                }
                Err(e) => {
                    inner.credential = None;
                    inner.timer.cancel();
                    inner.generation += 1;
                    (settled, Err(e))
                }
            }
        };

        match result {
            Ok(()) => {
                tracing::info!(waiters = settled.waiting(), "credential refreshed");
                let _ = self.event_tx.send(SessionEvent::Refreshed);
                settled.resolve(RefreshOutcome::Refreshed);
            }
            Err(e) => {
                tracing::warn!(waiters = settled.waiting(), err = %e, "credential refresh failed");
                let _ = self.event_tx.send(SessionEvent::RefreshFailed { error: e.to_string() });
                self.navigator.navigate(Navigation::Login(self.settings.login_url.clone()));
                settled.resolve(RefreshOutcome::Failed);
            }
        }
    }

    /// Arm the proactive refresh for a credential living `ttl`, replacing any
    /// earlier timer. Must be called with the state lock held.
    fn schedule_refresh(self: &Arc<Self>, inner: &mut SessionInner, ttl: Duration) {
        let delay = refresh_delay(ttl, self.settings.refresh_margin);
        let armed = inner.timer.arm(Instant::now() + delay);
        tracing::debug!(delay_secs = delay.as_secs(), "proactive refresh scheduled");
        tokio::spawn(proactive_refresh(Arc::downgrade(self), armed));
    }
}

async fn proactive_refresh(session: Weak<SessionCoordinator>, armed: ArmedTimer) {
    tokio::select! {
        _ = armed.cancel.cancelled() => return,
        _ = tokio::time::sleep_until(armed.fires_at) => {}
    }
    let Some(session) = session.upgrade() else {
        return;
    };
    let due = session.inner.lock().timer.fire(armed.id);
    if !due {
        return;
    }
    tracing::debug!("proactive refresh due");
    session.refresh().await;
}
