// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The client's proof of an authenticated session.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::session::identity::{decode_claims, Identity};
use crate::session::persist::PersistedSession;

/// Who issued a credential, which decides where it is refreshed and revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// `POST /auth/login` on the dashboard backend.
    Backend,
    /// Authorization-code exchange with the Identity Provider.
    IdentityProvider,
}

/// A token grant as returned by login, refresh, or code exchange.
#[derive(Debug, Clone)]
pub struct Grant {
    pub token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Duration,
    /// User returned alongside the token, if the server sent one.
    pub user: Option<Identity>,
}

/// Token plus expiry, owned exclusively by the session coordinator.
#[derive(Clone)]
pub struct Credential {
    token: String,
    refresh_token: Option<String>,
    source: CredentialSource,
    expires_at: Instant,
    /// Wall-clock expiry, kept for persistence across processes.
    expires_at_epoch: u64,
    identity: Option<Identity>,
}

impl Credential {
    /// Build a credential from a fresh grant.
    ///
    /// Rejects grants that would violate the authenticated invariant: an
    /// empty token or a TTL that is already spent.
    pub fn issue(grant: Grant, source: CredentialSource) -> anyhow::Result<Self> {
        if grant.token.trim().is_empty() {
            anyhow::bail!("server returned an empty token");
        }
        if grant.expires_in.is_zero() {
            anyhow::bail!("server returned a token with no lifetime");
        }
        let identity = grant.user.or_else(|| decode_claims(&grant.token));
        Ok(Self {
            token: grant.token,
            refresh_token: grant.refresh_token,
            source,
            expires_at: Instant::now() + grant.expires_in,
            expires_at_epoch: epoch_secs() + grant.expires_in.as_secs(),
            identity,
        })
    }

    /// Build the replacement for `self` from a refresh grant.
    ///
    /// The refresh token and identity carry over when the grant omits them.
    pub fn renew(&self, grant: Grant) -> anyhow::Result<Self> {
        let refresh_token = grant.refresh_token.clone().or_else(|| self.refresh_token.clone());
        let mut next = Self::issue(Grant { refresh_token, ..grant }, self.source)?;
        if next.identity.is_none() {
            next.identity = self.identity.clone();
        }
        Ok(next)
    }

    /// Rebuild a credential saved by a previous process.
    ///
    /// The result may already be expired; callers decide whether to refresh.
    pub fn restore(persisted: &PersistedSession) -> Option<Self> {
        if persisted.token.is_empty() {
            return None;
        }
        let remaining = Duration::from_secs(persisted.expires_at.saturating_sub(epoch_secs()));
        Some(Self {
            token: persisted.token.clone(),
            refresh_token: persisted.refresh_token.clone(),
            source: persisted.source,
            expires_at: Instant::now() + remaining,
            expires_at_epoch: persisted.expires_at,
            identity: persisted.identity.clone(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Remaining lifetime, zero once expired.
    pub fn expires_in(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            token: self.token.clone(),
            refresh_token: self.refresh_token.clone(),
            source: self.source,
            expires_at: self.expires_at_epoch,
            identity: self.identity.clone(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("source", &self.source)
            .field("expires_in", &self.expires_in())
            .field("identity", &self.identity)
            .finish()
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
