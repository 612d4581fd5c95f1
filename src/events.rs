//! Event streams published by a state machine.
//!
//! Two streams leave the engine: committed state changes and free-text
//! network events. Both are delivered through [`EventBus`], an explicit
//! publish/subscribe channel: every subscriber receives events in
//! publication order, and a subscription ends when its receiver is dropped.

use crate::core::{PlayerId, State};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Identifier assigned to each transition request by its machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A committed state change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateChange<S: State> {
    pub from: S,
    pub to: S,
    pub player: PlayerId,
}

/// Notification on the network-event stream.
///
/// `Display` renders the human-readable message shown by the surrounding
/// application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub enum NetworkEvent<S: State> {
    /// Request handled by the direct simulator with no network hop.
    Direct {
        request: RequestId,
        from: S,
        to: S,
        player: PlayerId,
    },
    /// Request left the client; it will arrive after `delay`.
    RequestSent {
        request: RequestId,
        from: S,
        to: S,
        player: PlayerId,
        delay: Duration,
    },
    /// Request was dropped and will never be processed.
    PacketLost {
        request: RequestId,
        from: S,
        to: S,
        player: PlayerId,
    },
    /// Delayed request reached the authority.
    ServerReceived {
        request: RequestId,
        to: S,
        player: PlayerId,
    },
    /// Authorization failed against the live state.
    TransitionRejected {
        request: RequestId,
        current: S,
        to: S,
        player: PlayerId,
    },
    /// Transition committed.
    StateChanged {
        request: RequestId,
        from: S,
        to: S,
        player: PlayerId,
    },
}

impl<S: State> NetworkEvent<S> {
    pub fn request(&self) -> RequestId {
        match self {
            Self::Direct { request, .. }
            | Self::RequestSent { request, .. }
            | Self::PacketLost { request, .. }
            | Self::ServerReceived { request, .. }
            | Self::TransitionRejected { request, .. }
            | Self::StateChanged { request, .. } => *request,
        }
    }

    pub fn player(&self) -> PlayerId {
        match self {
            Self::Direct { player, .. }
            | Self::RequestSent { player, .. }
            | Self::PacketLost { player, .. }
            | Self::ServerReceived { player, .. }
            | Self::TransitionRejected { player, .. }
            | Self::StateChanged { player, .. } => *player,
        }
    }
}

impl<S: State> Display for NetworkEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct {
                from, to, player, ..
            } => write!(
                f,
                "Player {player}: {} -> {} processed directly",
                from.name(),
                to.name()
            ),
            Self::RequestSent {
                from,
                to,
                player,
                delay,
                ..
            } => write!(
                f,
                "Player {player}: requesting {} -> {} (delay {}ms)",
                from.name(),
                to.name(),
                delay.as_millis()
            ),
            Self::PacketLost {
                from, to, player, ..
            } => write!(
                f,
                "Player {player}: packet lost ({} -> {})",
                from.name(),
                to.name()
            ),
            Self::ServerReceived { to, player, .. } => {
                write!(f, "Server received request to {} from player {player}", to.name())
            }
            Self::TransitionRejected {
                current, to, player, ..
            } => write!(
                f,
                "Transition {} -> {} rejected for player {player}",
                current.name(),
                to.name()
            ),
            Self::StateChanged {
                from, to, player, ..
            } => write!(
                f,
                "State changed {} -> {} by player {player}",
                from.name(),
                to.name()
            ),
        }
    }
}

/// Publish/subscribe channel with explicit subscriber lifetimes.
#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Vec<UnboundedSender<E>>,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Open a subscription. It receives every event published from now on
    /// until the receiver is dropped.
    pub fn subscribe(&mut self) -> UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, pruning closed ones.
    pub fn publish(&mut self, event: E) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect every event currently buffered in `receiver`.
pub fn drain<E>(receiver: &mut UnboundedReceiver<E>) -> Vec<E> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_enum;

    state_enum! {
        enum Light {
            Red,
            Green,
        }
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let mut bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(1);
        bus.publish(2);

        assert_eq!(drain(&mut first), vec![1, 2]);
        assert_eq!(drain(&mut second), vec![1, 2]);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let mut bus = EventBus::new();
        bus.publish("early");
        let mut late = bus.subscribe();
        bus.publish("late");

        assert_eq!(drain(&mut late), vec!["late"]);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut bus = EventBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        drop(gone);

        bus.publish(7u8);

        assert_eq!(bus.subscriber_count(), 1);
        drop(keep);
    }

    #[test]
    fn network_event_messages() {
        let sent = NetworkEvent::RequestSent {
            request: RequestId(1),
            from: Light::Red,
            to: Light::Green,
            player: PlayerId(2),
            delay: Duration::from_millis(120),
        };
        assert_eq!(sent.to_string(), "Player 2: requesting Red -> Green (delay 120ms)");

        let lost = NetworkEvent::PacketLost {
            request: RequestId(3),
            from: Light::Red,
            to: Light::Green,
            player: PlayerId(1),
        };
        assert_eq!(lost.to_string(), "Player 1: packet lost (Red -> Green)");
        assert_eq!(lost.request(), RequestId(3));
        assert_eq!(lost.player(), PlayerId(1));
    }

    #[test]
    fn state_change_serializes() {
        let change = StateChange {
            from: Light::Red,
            to: Light::Green,
            player: PlayerId(4),
        };
        let json = serde_json::to_string(&change).unwrap();
        let back: StateChange<Light> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
