// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fleetdash: session coordinator and API client for the fleet dashboard.

pub mod api;
pub mod backend;
pub mod callback;
pub mod command;
pub mod config;
pub mod encode;
pub mod error;
pub mod navigate;
pub mod session;

pub use api::ApiClient;
pub use error::ApiError;
pub use session::{LoginOutcome, RefreshOutcome, SessionCoordinator, SessionEvent, SessionSettings};
