// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session persistence: load/save to a JSON file with atomic writes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::session::credential::{epoch_secs, CredentialSource};
use crate::session::identity::Identity;

/// File name of the persisted session inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// Credential state saved between CLI invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub source: CredentialSource,
    /// Expiry as epoch seconds.
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

impl PersistedSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= epoch_secs()
    }
}

/// Load a persisted session. A missing file is `Ok(None)`.
pub fn load(path: &Path) -> anyhow::Result<Option<PersistedSession>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save a session atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so two concurrent saves never
/// share a `.tmp` file.
pub fn save(path: &Path, session: &PersistedSession) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(session)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Remove a persisted session. Missing files are not an error.
pub fn remove(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
