//! Core state machine types.
//!
//! This module contains the pure vocabulary shared by every other module:
//! - State definitions via the `State` trait
//! - Typed transition parameters stamped with the requesting player
//! - Guard predicates for authorization rules
//! - Immutable history of committed transitions

mod guard;
mod history;
mod params;
mod state;

pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use params::{ParameterVariant, PlayerId, TransitionParameters};
pub use state::{ParseStateError, State};
