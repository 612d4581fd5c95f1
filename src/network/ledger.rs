//! Ledger of in-flight delayed transitions.
//!
//! Entries are appended when a delayed request is accepted and are swept
//! lazily: every read filters out entries whose window has closed, and
//! every write prunes them. There is no size bound.

use crate::core::{PlayerId, State};
use crate::events::RequestId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A request travelling through the simulated network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PendingTransition<S: State> {
    pub request: RequestId,
    pub from_state: S,
    pub to_state: S,
    pub start_time: Duration,
    pub completion_time: Duration,
    pub requesting_player_id: PlayerId,
}

impl<S: State> PendingTransition<S> {
    pub fn is_active(&self, now: Duration) -> bool {
        now < self.completion_time
    }

    /// Fraction of the delay elapsed at `now`, clamped to `[0, 1]`.
    pub fn progress(&self, now: Duration) -> f64 {
        let window = self.completion_time.saturating_sub(self.start_time);
        if window.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_sub(self.start_time);
        (elapsed.as_secs_f64() / window.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn remaining(&self, now: Duration) -> Duration {
        self.completion_time.saturating_sub(now)
    }
}

#[derive(Clone, Debug)]
pub struct PendingLedger<S: State> {
    entries: Vec<PendingTransition<S>>,
}

impl<S: State> PendingLedger<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, entry: PendingTransition<S>, now: Duration) {
        self.sweep(now);
        self.entries.push(entry);
    }

    /// Drop entries that are no longer active. Returns how many were removed.
    pub fn sweep(&mut self, now: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.is_active(now));
        before - self.entries.len()
    }

    pub fn active_for(&self, player: PlayerId, now: Duration) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.requesting_player_id == player && entry.is_active(now))
            .count()
    }

    /// Active entries in acceptance order.
    pub fn all(&self, now: Duration) -> Vec<&PendingTransition<S>> {
        self.entries
            .iter()
            .filter(|entry| entry.is_active(now))
            .collect()
    }

    /// Entries held, including ones awaiting the next sweep.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: State> Default for PendingLedger<S> {
    fn default() -> Self {
        Self::new()
    }
}
