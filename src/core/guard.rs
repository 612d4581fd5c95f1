//! Guard predicates for authorizing state transitions.
//!
//! Guards are pure boolean functions over the requested target, the
//! machine's context and the request parameters. Behaviors compose them to
//! express per-state-pair authorization rules without side effects.

use super::params::TransitionParameters;
use super::state::State;
use std::sync::Arc;

type Predicate<S, C, P> = dyn Fn(&S, &C, &TransitionParameters<P>) -> bool + Send + Sync;

/// Pure predicate that decides whether a transition may commit.
///
/// The context is borrowed immutably, so a guard cannot change the data it
/// inspects and can be evaluated any number of times.
///
/// # Example
///
/// ```rust
/// use relay_fsm::core::{Guard, PlayerId, TransitionParameters};
/// use relay_fsm::state_enum;
///
/// state_enum! {
///     enum Door {
///         Open,
///         Closed,
///     }
/// }
///
/// struct Ctx {
///     locked: bool,
/// }
///
/// let guard: Guard<Door, Ctx, ()> =
///     Guard::to_state(Door::Open).and(Guard::new(|_, ctx: &Ctx, _| !ctx.locked));
///
/// let params = TransitionParameters::new(PlayerId(1), ());
/// assert!(guard.check(&Door::Open, &Ctx { locked: false }, &params));
/// assert!(!guard.check(&Door::Open, &Ctx { locked: true }, &params));
/// assert!(!guard.check(&Door::Closed, &Ctx { locked: false }, &params));
/// ```
pub struct Guard<S, C, P> {
    predicate: Arc<Predicate<S, C, P>>,
}

impl<S, C, P> Guard<S, C, P>
where
    S: State,
    C: 'static,
    P: 'static,
{
    /// Create a guard from a pure predicate function.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&S, &C, &TransitionParameters<P>) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Guard that admits every request.
    pub fn allow_all() -> Self {
        Self::new(|_, _, _| true)
    }

    /// Guard that rejects every request.
    pub fn deny_all() -> Self {
        Self::new(|_, _, _| false)
    }

    /// Guard that admits only requests targeting `target`.
    pub fn to_state(target: S) -> Self {
        Self::new(move |requested, _, _| *requested == target)
    }

    /// Evaluate the guard.
    pub fn check(&self, target: &S, context: &C, parameters: &TransitionParameters<P>) -> bool {
        (self.predicate)(target, context, parameters)
    }

    /// Both guards must admit the request.
    pub fn and(self, other: Self) -> Self {
        Self::new(move |target, context, parameters| {
            self.check(target, context, parameters) && other.check(target, context, parameters)
        })
    }

    /// Either guard may admit the request.
    pub fn or(self, other: Self) -> Self {
        Self::new(move |target, context, parameters| {
            self.check(target, context, parameters) || other.check(target, context, parameters)
        })
    }
}

impl<S, C, P> Clone for Guard<S, C, P> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}
