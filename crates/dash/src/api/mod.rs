// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard backend API, routed through the session-aware [`ApiClient`].

pub mod account;
pub mod applications;
pub mod client;

pub use applications::{Application, ApplicationService, DeployRequest};
pub use client::ApiClient;
