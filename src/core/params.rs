//! Transition parameters carried with every request.
//!
//! Each machine type declares its own closed set of parameter variants as a
//! plain enum. The engine wraps the chosen variant together with the id of
//! the player that asked for the transition; authorization predicates then
//! match on the variant exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

/// Identifier of the participant that submitted a transition request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PlayerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Bound for the per-machine parameter enum.
///
/// `Default` provides the empty parameter value used when a request carries
/// no domain data.
pub trait ParameterVariant: Clone + Debug + Default + Send + Sync + 'static {}

impl<T> ParameterVariant for T where T: Clone + Debug + Default + Send + Sync + 'static {}

/// Payload of a transition request.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::{PlayerId, TransitionParameters};
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// enum DoorParams {
///     #[default]
///     Plain,
///     Master { key_id: u32 },
/// }
///
/// let params = TransitionParameters::stamped(PlayerId(7), None::<DoorParams>);
/// assert_eq!(params.requesting_player_id, PlayerId(7));
/// assert_eq!(params.variant, DoorParams::Plain);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionParameters<P> {
    pub requesting_player_id: PlayerId,
    pub variant: P,
}

impl<P: ParameterVariant> TransitionParameters<P> {
    pub fn new(requesting_player_id: PlayerId, variant: P) -> Self {
        Self {
            requesting_player_id,
            variant,
        }
    }

    /// Stamp `player` onto the supplied variant, falling back to the empty
    /// value when none was given.
    pub fn stamped(player: PlayerId, variant: Option<P>) -> Self {
        Self::new(player, variant.unwrap_or_default())
    }
}
