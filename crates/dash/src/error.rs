// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::Deserialize;

/// Errors surfaced by the request pipeline and the services built on it.
///
/// Session failures never show up here as raw transport errors: by the time a
/// caller sees [`ApiError::SessionExpired`] the coordinator has already moved
/// to `Unauthenticated` and sent the user to the login surface.
#[derive(Debug)]
pub enum ApiError {
    /// Rejected with 401 after the one permitted retry (or not replayable).
    Unauthorized,
    /// The refresh that would have rescued the request failed.
    SessionExpired,
    NotFound(String),
    BadRequest(String),
    /// Any other non-success status from the backend.
    Upstream { status: u16, message: String },
    Transport(reqwest::Error),
    Decode(String),
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Upstream { .. } => "UPSTREAM",
            Self::Transport(_) => "TRANSPORT",
            Self::Decode(_) => "DECODE",
        }
    }

    /// HTTP status the error corresponds to, when it came from a response.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized | Self::SessionExpired => Some(401),
            Self::NotFound(_) => Some(404),
            Self::BadRequest(_) => Some(400),
            Self::Upstream { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// Whether the error means the user has to log in again.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionExpired)
    }

    /// Map a non-success status and its body to an error.
    ///
    /// Prefers the backend's `{"message": ...}` envelope, falling back to the
    /// raw body text.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or_else(|| body.trim().to_owned());
        match status {
            401 => Self::Unauthorized,
            404 => Self::NotFound(message),
            400 | 422 => Self::BadRequest(message),
            _ => Self::Upstream { status, message },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => f.write_str("request rejected: not authorized"),
            Self::SessionExpired => f.write_str("session expired, log in again"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Upstream { status, message } => write!(f, "backend error ({status}): {message}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Decode(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e)
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Error body shape returned by the backend.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
