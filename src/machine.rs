//! State machine driver.
//!
//! The driver turns a transition request into a committed state change:
//! request → network simulator → authorization against the live state →
//! `on_exit` / switch / `on_enter` → event notifications.
//!
//! A machine has a single owner. All mutation of the current state, the
//! pending ledger and the caller's context happens on the owner's call
//! stack, inside `request_transition`, `deliver_due` or `update`. To share a
//! machine across threads, hand it to [`crate::runtime::spawn`], which
//! serializes access through a command queue.

use crate::behavior::StateBehavior;
use crate::builder::StateMachineBuilder;
use crate::core::{
    ParameterVariant, PlayerId, State, StateHistory, StateTransition, TransitionParameters,
};
use crate::events::{EventBus, NetworkEvent, RequestId, StateChange};
use crate::network::{
    Dispatch, NetworkSimulator, PendingTransition, SimulationStats, TransitionRequest,
};
use crate::registry::StateRegistry;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, debug_span, info, trace};

/// Where the driver is in its own request protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverPhase {
    /// No request in flight.
    Idle,
    /// At least one request is held by the network simulator.
    AwaitingNetwork,
    /// A delivered request is being authorized and committed.
    ///
    /// The commit step runs to completion inside a single driver call, so
    /// [`StateMachine::phase`] never reports it. It is visible as the
    /// `phase` field of the `commit` tracing span.
    Validating,
}

/// Finite state machine whose transitions pass through a network simulator.
///
/// `S` is the state enumeration, `C` the caller-owned context passed by
/// reference into every hook, and `P` the parameter variant enum.
///
/// # Example
///
/// ```rust
/// use relay_fsm::behavior::StateBehavior;
/// use relay_fsm::core::{PlayerId, TransitionParameters};
/// use relay_fsm::events::drain;
/// use relay_fsm::machine::StateMachine;
/// use relay_fsm::state_enum;
///
/// state_enum! {
///     enum Gate {
///         Closed,
///         Open,
///     }
/// }
///
/// struct Swing(Gate);
///
/// impl StateBehavior<Gate, (), ()> for Swing {
///     fn state_type(&self) -> Gate {
///         self.0
///     }
///
///     fn can_transition_to(&self, target: &Gate, _: &(), _: &TransitionParameters<()>) -> bool {
///         *target != self.0
///     }
/// }
///
/// let mut machine = StateMachine::builder()
///     .initial(Gate::Closed)
///     .register(Gate::Closed, || Swing(Gate::Closed))
///     .register(Gate::Open, || Swing(Gate::Open))
///     .build()
///     .expect("every gate state registered");
/// let mut changes = machine.subscribe_state_changes();
///
/// // The default network is direct: the commit happens inside the call.
/// machine.request_transition(&mut (), Gate::Open, PlayerId(1), None);
///
/// assert_eq!(machine.current_state(), &Gate::Open);
/// assert_eq!(drain(&mut changes).len(), 1);
/// ```
pub struct StateMachine<S: State, C, P> {
    current: S,
    registry: StateRegistry<S, C, P>,
    network: Box<dyn NetworkSimulator<S, P>>,
    history: StateHistory<S>,
    state_changes: EventBus<StateChange<S>>,
    network_events: EventBus<NetworkEvent<S>>,
    next_request: u64,
    started: bool,
}

impl<S, C, P> StateMachine<S, C, P>
where
    S: State,
    C: 'static,
    P: ParameterVariant,
{
    pub fn builder() -> StateMachineBuilder<S, C, P> {
        StateMachineBuilder::new()
    }

    pub(crate) fn from_parts(
        initial: S,
        registry: StateRegistry<S, C, P>,
        network: Box<dyn NetworkSimulator<S, P>>,
        history: StateHistory<S>,
    ) -> Self {
        Self {
            current: initial,
            registry,
            network,
            history,
            state_changes: EventBus::new(),
            network_events: EventBus::new(),
            next_request: 0,
            started: false,
        }
    }

    /// Run `on_enter` for the initial state. Later calls do nothing.
    pub fn start(&mut self, context: &mut C) {
        if self.started {
            return;
        }
        self.started = true;
        info!(state = self.current.name(), "State machine started");
        self.registry.get(&self.current).on_enter(context);
    }

    /// Ask for a transition to `target` on behalf of `player`.
    ///
    /// The player id is stamped into the parameters (the empty variant is
    /// used when `parameters` is `None`) and the request is handed to the
    /// network simulator. The outcome is only observable through the event
    /// streams: with the direct simulator the commit or rejection has
    /// already happened when this returns; with the delayed simulator it
    /// happens in a later [`deliver_due`](Self::deliver_due) or never, if
    /// the request is lost.
    pub fn request_transition(
        &mut self,
        context: &mut C,
        target: S,
        player: PlayerId,
        parameters: Option<P>,
    ) {
        self.next_request += 1;
        let request = TransitionRequest {
            id: RequestId(self.next_request),
            from: self.current.clone(),
            target,
            parameters: TransitionParameters::stamped(player, parameters),
        };

        debug!(
            request = %request.id,
            player = player.0,
            from = request.from.name(),
            to = request.target.name(),
            "Transition requested"
        );

        match self
            .network
            .process_transition(request, &mut self.network_events)
        {
            Dispatch::Delivered(request) => self.commit(context, request),
            Dispatch::Scheduled { completes_at } => {
                trace!(completes_at = ?completes_at, "Awaiting network");
            }
            Dispatch::Lost => {}
        }
    }

    /// Commit or reject every request whose network delay has expired.
    /// Returns how many requests were processed.
    pub fn deliver_due(&mut self, context: &mut C) -> usize {
        let due = self.network.take_due(&mut self.network_events);
        let count = due.len();
        for request in due {
            self.commit(context, request);
        }
        count
    }

    /// Per-tick update: deliver expired requests, then run `on_update` for
    /// the current state.
    pub fn update(&mut self, context: &mut C, delta: Duration) {
        self.deliver_due(context);
        self.registry.get(&self.current).on_update(context, delta);
    }

    fn commit(&mut self, context: &mut C, request: TransitionRequest<S, P>) {
        let span = debug_span!("commit", phase = ?DriverPhase::Validating, request = %request.id);
        let _entered = span.enter();

        // Authorize against the state as it is now, not as it was when the
        // request was submitted.
        let from = self.current.clone();
        let player = request.player();
        let authorized =
            self.registry
                .get(&from)
                .can_transition_to(&request.target, context, &request.parameters);

        if !authorized {
            debug!(
                request = %request.id,
                player = player.0,
                current = from.name(),
                to = request.target.name(),
                "Transition rejected"
            );
            self.network_events.publish(NetworkEvent::TransitionRejected {
                request: request.id,
                current: from,
                to: request.target,
                player,
            });
            return;
        }

        self.registry.get(&from).on_exit(context);
        self.current = request.target.clone();
        self.registry.get(&self.current).on_enter(context);

        debug!(
            request = %request.id,
            player = player.0,
            from = from.name(),
            to = self.current.name(),
            "Transition committed"
        );

        self.history.push(StateTransition {
            from: from.clone(),
            to: self.current.clone(),
            timestamp: Utc::now(),
            player,
        });
        self.network_events.publish(NetworkEvent::StateChanged {
            request: request.id,
            from: from.clone(),
            to: self.current.clone(),
            player,
        });
        self.state_changes.publish(StateChange {
            from,
            to: self.current.clone(),
            player,
        });
    }

    pub fn current_state(&self) -> &S {
        &self.current
    }

    pub fn is_final(&self) -> bool {
        self.current.is_final()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn phase(&self) -> DriverPhase {
        if self.network.in_flight() > 0 {
            DriverPhase::AwaitingNetwork
        } else {
            DriverPhase::Idle
        }
    }

    /// Behavior of the current state.
    pub fn current_behavior(&self) -> &dyn StateBehavior<S, C, P> {
        self.registry.get(&self.current)
    }

    pub fn history(&self) -> &StateHistory<S> {
        &self.history
    }

    /// Active pending transitions, oldest first.
    pub fn pending_transitions(&self) -> Vec<PendingTransition<S>> {
        self.network.pending()
    }

    pub fn active_requests_for(&self, player: PlayerId) -> usize {
        self.network.active_for(player)
    }

    /// Requests held by the network and not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.network.in_flight()
    }

    pub fn next_delivery(&self) -> Option<Duration> {
        self.network.next_due()
    }

    pub fn network_stats(&self) -> SimulationStats {
        self.network.stats()
    }

    /// Subscribe to committed state changes.
    pub fn subscribe_state_changes(&mut self) -> UnboundedReceiver<StateChange<S>> {
        self.state_changes.subscribe()
    }

    /// Subscribe to network events.
    pub fn subscribe_network_events(&mut self) -> UnboundedReceiver<NetworkEvent<S>> {
        self.network_events.subscribe()
    }

    /// Tear the machine down. Requests still in flight are discarded.
    pub fn shutdown(self) -> SimulationStats {
        let stats = self.network.stats();
        info!(
            state = self.current.name(),
            discarded = self.network.in_flight(),
            commits = self.history.recorded(),
            "State machine shut down"
        );
        stats
    }
}
