//! Simulated delivery of transition requests.
//!
//! A [`NetworkSimulator`] sits between a request and its commit. The
//! direct simulator hands requests straight back for a synchronous commit,
//! as an authoritative server would. The delayed simulator holds each
//! request for a random delay, may drop it entirely, and releases it once
//! its delay has expired.
//!
//! Delivery is reported by return value rather than callback: a request is
//! either handed back immediately, scheduled for later release through
//! [`NetworkSimulator::take_due`], or lost.

mod config;
mod delayed;
mod direct;
mod ledger;

pub use config::{ConfigError, NetworkConditions, NetworkConditionsBuilder};
pub use delayed::DelayedNetworkSimulator;
pub use direct::DirectNetworkSimulator;
pub use ledger::{PendingLedger, PendingTransition};

use crate::core::{PlayerId, State, TransitionParameters};
use crate::events::{EventBus, NetworkEvent, RequestId};
use std::time::Duration;

/// A transition request as it travels through the network.
#[derive(Clone, Debug, PartialEq)]
pub struct TransitionRequest<S: State, P> {
    pub id: RequestId,
    /// State of the machine when the request was submitted. Informational
    /// only; authorization always uses the state at commit time.
    pub from: S,
    pub target: S,
    pub parameters: TransitionParameters<P>,
}

impl<S: State, P> TransitionRequest<S, P> {
    pub fn player(&self) -> PlayerId {
        self.parameters.requesting_player_id
    }
}

/// Outcome of handing a request to a simulator.
#[derive(Clone, Debug, PartialEq)]
pub enum Dispatch<S: State, P> {
    /// Deliver now, in the caller's control flow.
    Delivered(TransitionRequest<S, P>),
    /// Released by `take_due` once `completes_at` is reached.
    Scheduled { completes_at: Duration },
    /// Dropped. Never delivered and never retried.
    Lost,
}

/// Delivery counters for a simulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimulationStats {
    /// Requests scheduled for delayed delivery.
    pub sent: u64,
    /// Requests dropped by loss simulation.
    pub lost: u64,
    /// Requests handed back for commit.
    pub delivered: u64,
}

impl SimulationStats {
    pub fn submitted(&self) -> u64 {
        self.sent + self.lost
    }

    /// Fraction of submitted requests that were dropped.
    pub fn loss_rate(&self) -> f64 {
        let total = self.submitted();
        if total == 0 {
            0.0
        } else {
            self.lost as f64 / total as f64
        }
    }
}

/// Delivery strategy for transition requests.
pub trait NetworkSimulator<S: State, P>: Send {
    /// Accept a request. Network events describing what happened are
    /// published on `events`.
    fn process_transition(
        &mut self,
        request: TransitionRequest<S, P>,
        events: &mut EventBus<NetworkEvent<S>>,
    ) -> Dispatch<S, P>;

    /// Release every scheduled request whose delay has expired, in expiry
    /// order.
    fn take_due(
        &mut self,
        _events: &mut EventBus<NetworkEvent<S>>,
    ) -> Vec<TransitionRequest<S, P>> {
        Vec::new()
    }

    /// Active pending transitions in acceptance order.
    fn pending(&self) -> Vec<PendingTransition<S>> {
        Vec::new()
    }

    /// Active pending transitions requested by `player`.
    fn active_for(&self, _player: PlayerId) -> usize {
        0
    }

    /// Requests scheduled but not yet released.
    fn in_flight(&self) -> usize {
        0
    }

    /// Time at which the next scheduled request is due.
    fn next_due(&self) -> Option<Duration> {
        None
    }

    fn stats(&self) -> SimulationStats;
}
