//! Relay FSM: a finite state machine engine with simulated transition delivery
//!
//! Transitions are not applied directly. A request passes through a
//! pluggable network simulator that may deliver it at once, hold it for a
//! random delay, or drop it, which makes the engine a small model of
//! client/server state replication. When a request arrives it is authorized
//! against the machine's *current* state before anything changes.
//!
//! # Core Concepts
//!
//! - **State**: a closed enumeration implementing [`State`]
//! - **Behavior**: one [`StateBehavior`] per state with lifecycle hooks and
//!   the authorization predicate
//! - **Registry**: explicit state-to-behavior mapping, validated eagerly
//! - **Network simulator**: direct or delayed/lossy delivery with a ledger
//!   of pending transitions
//! - **Events**: committed state changes and network events, delivered over
//!   publish/subscribe channels
//!
//! # Example
//!
//! ```rust
//! use relay_fsm::behavior::StateBehavior;
//! use relay_fsm::clock::ManualClock;
//! use relay_fsm::core::{PlayerId, TransitionParameters};
//! use relay_fsm::events::drain;
//! use relay_fsm::network::{DelayedNetworkSimulator, NetworkConditions};
//! use relay_fsm::{state_enum, StateMachine};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! state_enum! {
//!     enum Door {
//!         Closed,
//!         Open,
//!     }
//! }
//!
//! struct Hinge(Door);
//!
//! impl StateBehavior<Door, (), ()> for Hinge {
//!     fn state_type(&self) -> Door {
//!         self.0
//!     }
//!
//!     fn can_transition_to(&self, target: &Door, _: &(), _: &TransitionParameters<()>) -> bool {
//!         *target != self.0
//!     }
//! }
//!
//! let clock = ManualClock::new();
//! let network = DelayedNetworkSimulator::with_seed(
//!     NetworkConditions::fixed(Duration::from_millis(80)),
//!     Arc::new(clock.clone()),
//!     7,
//! )
//! .expect("fixed delay is valid");
//!
//! let mut door = StateMachine::builder()
//!     .initial(Door::Closed)
//!     .register(Door::Closed, || Hinge(Door::Closed))
//!     .register(Door::Open, || Hinge(Door::Open))
//!     .network(network)
//!     .build()
//!     .expect("both door states registered");
//! let mut changes = door.subscribe_state_changes();
//!
//! door.request_transition(&mut (), Door::Open, PlayerId(1), None);
//! assert_eq!(door.current_state(), &Door::Closed);
//!
//! clock.advance(Duration::from_millis(80));
//! door.update(&mut (), Duration::from_millis(80));
//!
//! assert_eq!(door.current_state(), &Door::Open);
//! assert_eq!(drain(&mut changes).len(), 1);
//! ```

pub mod behavior;
pub mod builder;
pub mod clock;
pub mod core;
pub mod events;
pub mod machine;
pub mod network;
pub mod registry;
pub mod runtime;

// Re-export commonly used types
pub use behavior::StateBehavior;
pub use builder::{BuildError, StateMachineBuilder};
pub use core::{Guard, PlayerId, State, StateHistory, StateTransition, TransitionParameters};
pub use events::{NetworkEvent, StateChange};
pub use machine::{DriverPhase, StateMachine};
pub use registry::{RegistryError, StateRegistry};
