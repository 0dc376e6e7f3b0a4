// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Account registration.

use serde::{Deserialize, Serialize};

use crate::api::client::ApiClient;
use crate::error::ApiError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub organization: String,
    pub role: String,
}

impl RegisterRequest {
    /// Check the request locally. Returns the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("email", &self.email),
            ("password", &self.password),
            ("organization", &self.organization),
            ("role", &self.role),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(format!("{field} is required"));
        }
        if !looks_like_email(&self.email) {
            return Err("email address is not valid".to_owned());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!("password must be at least {MIN_PASSWORD_LEN} characters"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// `POST /auth/register`. Needs no session.
pub async fn register(client: &ApiClient, request: &RegisterRequest) -> Result<(), ApiError> {
    request.validate().map_err(ApiError::BadRequest)?;
    let resp: RegisterResponse =
        client.json(client.post("/auth/register").json(request)).await?;
    if resp.success {
        Ok(())
    } else {
        let reason = resp.error.or(resp.message).unwrap_or_else(|| "registration failed".to_owned());
        Err(ApiError::BadRequest(reason))
    }
}

/// `local@domain.tld` with no whitespace.
fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.split_once('.').is_some_and(|(a, b)| !a.is_empty() && !b.is_empty())
        }
        None => false,
    }
}

#[cfg(test)]
#[path = "account_tests.rs"]
mod tests;
