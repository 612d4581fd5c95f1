//! Core State trait for state machine states.
//!
//! Every machine is driven over a closed enumeration of states. The
//! enumeration is reported through [`State::variants`] so the registry can
//! prove at construction time that every value has a behavior.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

/// Trait for state machine states.
///
/// All methods are pure. States are plain values describing the current
/// position of a machine; they carry no behavior of their own.
///
/// # Required Traits
///
/// - `Clone`, `Eq`, `Hash`: states key the behavior registry
/// - `Debug`: states must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: states travel inside events and history
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum DoorState {
///     Open,
///     Closed,
///     Jammed,
/// }
///
/// impl State for DoorState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Open => "Open",
///             Self::Closed => "Closed",
///             Self::Jammed => "Jammed",
///         }
///     }
///
///     fn variants() -> Vec<Self> {
///         vec![Self::Open, Self::Closed, Self::Jammed]
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Jammed)
///     }
/// }
///
/// assert_eq!(DoorState::variants().len(), 3);
/// ```
pub trait State:
    Clone + Eq + Hash + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Every value of the enumeration, in declaration order.
    ///
    /// The registry validates completeness against this list, so it must
    /// name each value exactly once.
    fn variants() -> Vec<Self>;

    /// Check if this is a final (terminal) state.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}

/// A state name that does not belong to the enumeration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{input}' is not a {machine} state")]
pub struct ParseStateError {
    /// Name of the state enumeration being parsed.
    pub machine: &'static str,
    /// The rejected input.
    pub input: String,
}

impl ParseStateError {
    pub fn new(machine: &'static str, input: impl Into<String>) -> Self {
        Self {
            machine,
            input: input.into(),
        }
    }
}
