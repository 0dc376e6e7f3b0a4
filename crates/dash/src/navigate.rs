// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Where to send the user when the session needs them.

use std::io::Write;

use serde::Serialize;

/// A request to move the user to another surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum Navigation {
    /// Identity Provider authorization page (redirect login).
    IdentityProvider(String),
    /// Local login surface after the session was lost.
    Login(String),
    /// Post-logout page (server-supplied or Identity Provider end-session).
    Logout(String),
}

impl Navigation {
    pub fn url(&self) -> &str {
        match self {
            Self::IdentityProvider(url) | Self::Login(url) | Self::Logout(url) => url,
        }
    }
}

/// Sink for navigation requests, injected into the session coordinator.
pub trait Navigator: Send + Sync {
    fn navigate(&self, to: Navigation);
}

/// Navigator for terminal use: tells the user which URL to open.
#[derive(Debug, Default)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, to: Navigation) {
        tracing::debug!(navigation = ?to, "navigate");
        let message = match to {
            Navigation::IdentityProvider(ref url) => format!("Open this URL to sign in:\n  {url}"),
            Navigation::Login(ref url) => format!("Session expired. Sign in again: {url}"),
            Navigation::Logout(ref url) => format!("Signed out. To end the SSO session visit: {url}"),
        };
        let _ = writeln!(std::io::stderr(), "{message}");
    }
}
