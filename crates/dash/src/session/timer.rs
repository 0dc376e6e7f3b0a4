// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bookkeeping for the proactive refresh timer.
//!
//! The coordinator spawns the sleeping task; this type only tracks which
//! task is current so that exactly one is ever live.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Delay before the proactive refresh for a credential living `ttl`.
///
/// Fires `margin` before expiry. When the TTL does not exceed the margin the
/// timer fires at half the TTL instead, so short-lived tokens do not refresh
/// in a tight loop.
pub fn refresh_delay(ttl: Duration, margin: Duration) -> Duration {
    if ttl > margin {
        ttl - margin
    } else {
        ttl / 2
    }
}

/// Handle for a newly armed timer, to be moved into its task.
#[derive(Debug, Clone)]
pub struct ArmedTimer {
    pub id: u64,
    pub fires_at: Instant,
    pub cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub struct RefreshTimer {
    current: Option<ArmedTimer>,
    next_id: u64,
}

impl RefreshTimer {
    /// Arm a new timer, cancelling the previous one first.
    pub fn arm(&mut self, fires_at: Instant) -> ArmedTimer {
        self.cancel();
        self.next_id += 1;
        let armed = ArmedTimer { id: self.next_id, fires_at, cancel: CancellationToken::new() };
        self.current = Some(armed.clone());
        armed
    }

    pub fn cancel(&mut self) {
        if let Some(prev) = self.current.take() {
            prev.cancel.cancel();
        }
    }

    /// Called by a timer task when its sleep completes. Returns `false` if the
    /// task was superseded and must not refresh.
    pub fn fire(&mut self, id: u64) -> bool {
        match self.current {
            Some(ref armed) if armed.id == id && !armed.cancel.is_cancelled() => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn fires_at(&self) -> Option<Instant> {
        self.current.as_ref().map(|t| t.fires_at)
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
