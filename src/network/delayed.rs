//! Delayed and lossy delivery.

use super::config::{ConfigError, NetworkConditions};
use super::ledger::{PendingLedger, PendingTransition};
use super::{Dispatch, NetworkSimulator, SimulationStats, TransitionRequest};
use crate::clock::Clock;
use crate::core::{PlayerId, State};
use crate::events::{EventBus, NetworkEvent};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Orders scheduled deliveries by due time, then by submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct DeliveryKey {
    due: Duration,
    sequence: u64,
}

/// Simulates a client-to-server hop with random delay and optional loss.
///
/// For every request a delay is drawn uniformly from the configured
/// interval. With loss enabled, the request is then dropped with the
/// configured probability: a `PacketLost` event is published and the
/// request is abandoned for good. Surviving requests get a pending ledger
/// entry, a `RequestSent` event, and are released by [`take_due`] once
/// their delay has expired, publishing `ServerReceived`.
///
/// Requests complete in the order their delays expire, which need not be
/// submission order. Requests due at the same instant keep submission
/// order.
///
/// Randomness comes from a seeded ChaCha8 generator, so a fixed seed and a
/// [`ManualClock`](crate::clock::ManualClock) give fully reproducible runs.
///
/// [`take_due`]: NetworkSimulator::take_due
pub struct DelayedNetworkSimulator<S: State, P> {
    conditions: NetworkConditions,
    clock: Arc<dyn Clock>,
    rng: ChaCha8Rng,
    scheduled: BTreeMap<DeliveryKey, TransitionRequest<S, P>>,
    sequence: u64,
    ledger: PendingLedger<S>,
    stats: SimulationStats,
}

impl<S: State, P> DelayedNetworkSimulator<S, P> {
    /// Simulator seeded from the thread RNG.
    ///
    /// Fails when `conditions` do not validate.
    pub fn new(conditions: NetworkConditions, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Self::with_seed(conditions, clock, rand::random())
    }

    /// Simulator with a fixed seed for reproducible delay and loss draws.
    ///
    /// Fails when `conditions` do not validate.
    pub fn with_seed(
        conditions: NetworkConditions,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        conditions.validate()?;
        Ok(Self {
            conditions,
            clock,
            rng: ChaCha8Rng::seed_from_u64(seed),
            scheduled: BTreeMap::new(),
            sequence: 0,
            ledger: PendingLedger::new(),
            stats: SimulationStats::default(),
        })
    }

    pub fn conditions(&self) -> &NetworkConditions {
        &self.conditions
    }

    /// Replace the link conditions. Applies to requests submitted from now on.
    /// Invalid conditions are refused and the current ones kept.
    pub fn set_conditions(&mut self, conditions: NetworkConditions) -> Result<(), ConfigError> {
        conditions.validate()?;
        self.conditions = conditions;
        Ok(())
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }
}

impl<S, P> NetworkSimulator<S, P> for DelayedNetworkSimulator<S, P>
where
    S: State,
    P: Send,
{
    fn process_transition(
        &mut self,
        request: TransitionRequest<S, P>,
        events: &mut EventBus<NetworkEvent<S>>,
    ) -> Dispatch<S, P> {
        let now = self.clock.now();
        let delay = self.conditions.sample_delay(&mut self.rng);
        let player = request.player();

        if self.conditions.should_drop(&mut self.rng) {
            self.stats.lost += 1;
            warn!(
                request = %request.id,
                player = player.0,
                from = request.from.name(),
                to = request.target.name(),
                "Transition request lost"
            );
            events.publish(NetworkEvent::PacketLost {
                request: request.id,
                from: request.from,
                to: request.target,
                player,
            });
            return Dispatch::Lost;
        }

        let completes_at = now + delay;
        self.ledger.record(
            PendingTransition {
                request: request.id,
                from_state: request.from.clone(),
                to_state: request.target.clone(),
                start_time: now,
                completion_time: completes_at,
                requesting_player_id: player,
            },
            now,
        );

        events.publish(NetworkEvent::RequestSent {
            request: request.id,
            from: request.from.clone(),
            to: request.target.clone(),
            player,
            delay,
        });

        debug!(
            request = %request.id,
            player = player.0,
            delay_ms = delay.as_millis() as u64,
            "Transition request scheduled"
        );

        self.sequence += 1;
        self.scheduled.insert(
            DeliveryKey {
                due: completes_at,
                sequence: self.sequence,
            },
            request,
        );
        self.stats.sent += 1;

        Dispatch::Scheduled { completes_at }
    }

    fn take_due(&mut self, events: &mut EventBus<NetworkEvent<S>>) -> Vec<TransitionRequest<S, P>> {
        let now = self.clock.now();
        let mut due = Vec::new();

        while let Some(entry) = self.scheduled.first_entry() {
            if entry.key().due > now {
                break;
            }
            let request = entry.remove();
            trace!(request = %request.id, "Transition request delivered");
            events.publish(NetworkEvent::ServerReceived {
                request: request.id,
                to: request.target.clone(),
                player: request.player(),
            });
            self.stats.delivered += 1;
            due.push(request);
        }

        self.ledger.sweep(now);
        due
    }

    fn pending(&self) -> Vec<PendingTransition<S>> {
        self.ledger
            .all(self.clock.now())
            .into_iter()
            .cloned()
            .collect()
    }

    fn active_for(&self, player: PlayerId) -> usize {
        self.ledger.active_for(player, self.clock.now())
    }

    fn in_flight(&self) -> usize {
        self.scheduled.len()
    }

    fn next_due(&self) -> Option<Duration> {
        self.scheduled.keys().next().map(|key| key.due)
    }

    fn stats(&self) -> SimulationStats {
        self.stats
    }
}
