// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Network calls the session coordinator depends on.
//!
//! The coordinator only sees [`AuthBackend`]; [`http::HttpAuthBackend`] is
//! the production implementation over the dashboard REST API and the
//! Identity Provider's token endpoint.

pub mod http;
pub mod oauth;

use futures_util::future::BoxFuture;

use crate::session::credential::{Credential, Grant};
use crate::session::identity::Identity;
use crate::session::pkce::CodeExchange;

pub use http::HttpAuthBackend;

/// Session issuance, refresh, and revocation.
///
/// Every method reports failure as an error; the coordinator turns those into
/// state transitions and never lets them reach its callers.
pub trait AuthBackend: Send + Sync {
    /// Direct login with a primary credential.
    fn login<'a>(&'a self, username: &'a str, password: &'a str)
        -> BoxFuture<'a, anyhow::Result<Grant>>;

    /// Obtain a replacement for `credential`.
    fn refresh<'a>(&'a self, credential: &'a Credential) -> BoxFuture<'a, anyhow::Result<Grant>>;

    /// Invalidate the server-side session. Returns a logout URL if the server
    /// wants the user sent somewhere specific.
    fn logout<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> BoxFuture<'a, anyhow::Result<Option<String>>>;

    /// Fetch the identity the token belongs to; fails if the token is not
    /// (or no longer) accepted.
    fn whoami<'a>(&'a self, token: &'a str) -> BoxFuture<'a, anyhow::Result<Identity>>;

    /// Redeem an authorization code from the SSO redirect.
    fn exchange_code<'a>(
        &'a self,
        exchange: &'a CodeExchange,
        code: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Grant>>;
}
