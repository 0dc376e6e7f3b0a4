// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Who the current credential belongs to.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// User identity derived from the credential or fetched from `GET /user/me`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, alias = "id", alias = "sub")]
    pub subject: String,
    #[serde(default, alias = "preferred_username")]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "displayName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Best human-readable label: display name, then username, then subject.
    pub fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.username.is_empty() => &self.username,
            _ => &self.subject,
        }
    }
}

/// JWT payload fields issued by a Keycloak-style realm.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    realm_access: Option<RealmAccess>,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RealmAccess {
    #[serde(default)]
    roles: Vec<String>,
}

/// Decode the identity carried in a JWT's payload.
///
/// The signature is not verified; the backend does that on every request.
/// Returns `None` for opaque (non-JWT) tokens.
pub fn decode_claims(token: &str) -> Option<Identity> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;

    let mut roles = claims.realm_access.map(|r| r.roles).unwrap_or_default();
    for role in claims.roles {
        if !roles.contains(&role) {
            roles.push(role);
        }
    }

    Some(Identity {
        username: claims.preferred_username.unwrap_or_else(|| claims.sub.clone()),
        subject: claims.sub,
        email: claims.email,
        name: claims.name,
        roles,
    })
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
