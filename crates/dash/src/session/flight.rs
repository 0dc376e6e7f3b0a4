// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight gate for credential refresh.
//!
//! At most one refresh is in flight. Every caller, including the one that
//! started it, gets a receiver; the flight is torn down before any receiver
//! is resolved so a woken caller can start the next cycle straight away.

use tokio::sync::oneshot;

/// Result of a refresh as seen by every caller that joined it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed,
}

impl RefreshOutcome {
    pub fn is_refreshed(self) -> bool {
        self == Self::Refreshed
    }
}

/// How a caller joined the gate.
#[derive(Debug)]
pub enum Joined {
    /// No flight was pending; the caller must issue the refresh request.
    Started(oneshot::Receiver<RefreshOutcome>),
    /// A flight was already pending; the caller just waits.
    Waiting(oneshot::Receiver<RefreshOutcome>),
}

/// Waiters of the flight that was just torn down.
#[derive(Debug)]
pub struct Settled {
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

impl Settled {
    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    /// Resolve every waiter with `outcome`. Dropped receivers are ignored.
    pub fn resolve(self, outcome: RefreshOutcome) {
        for waiter in self.waiters {
            let _ = waiter.send(outcome);
        }
    }
}

#[derive(Debug, Default)]
pub struct RefreshFlight {
    /// `Some` while a refresh is pending.
    waiters: Option<Vec<oneshot::Sender<RefreshOutcome>>>,
}

impl RefreshFlight {
    pub fn is_pending(&self) -> bool {
        self.waiters.is_some()
    }

    /// Number of callers waiting on the pending flight.
    pub fn waiting(&self) -> usize {
        self.waiters.as_ref().map_or(0, Vec::len)
    }

    pub fn join(&mut self) -> Joined {
        let (tx, rx) = oneshot::channel();
        match self.waiters {
            Some(ref mut waiters) => {
                waiters.push(tx);
                Joined::Waiting(rx)
            }
            None => {
                self.waiters = Some(vec![tx]);
                Joined::Started(rx)
            }
        }
    }

    /// Tear down the pending flight and hand back its waiters.
    pub fn settle(&mut self) -> Settled {
        Settled { waiters: self.waiters.take().unwrap_or_default() }
    }
}

#[cfg(test)]
#[path = "flight_tests.rs"]
mod tests;
