//! Per-state behavior contract.
//!
//! A behavior is a long-lived object bound to exactly one state value. The
//! machine calls its lifecycle hooks with the caller-owned context and asks
//! it whether a transition out of its state is currently authorized.

use crate::core::{State, TransitionParameters};
use std::time::Duration;

/// Behavior attached to a single state of a machine.
///
/// `S` is the state enumeration, `C` the caller-owned context passed into
/// every hook and `P` the machine's parameter variant enum.
///
/// Lifecycle hooks may mutate the context freely. [`can_transition_to`]
/// only receives a shared reference: it must be pure, total over every
/// target state and safe to evaluate repeatedly.
///
/// [`can_transition_to`]: StateBehavior::can_transition_to
///
/// # Example
///
/// ```rust
/// use relay_fsm::behavior::StateBehavior;
/// use relay_fsm::core::TransitionParameters;
/// use relay_fsm::state_enum;
/// use std::time::Duration;
///
/// state_enum! {
///     enum Lamp {
///         Off,
///         On,
///     }
/// }
///
/// #[derive(Default)]
/// struct LampContext {
///     lit_for: Duration,
/// }
///
/// struct OnBehavior;
///
/// impl StateBehavior<Lamp, LampContext, ()> for OnBehavior {
///     fn state_type(&self) -> Lamp {
///         Lamp::On
///     }
///
///     fn on_enter(&self, context: &mut LampContext) {
///         context.lit_for = Duration::ZERO;
///     }
///
///     fn on_update(&self, context: &mut LampContext, delta: Duration) {
///         context.lit_for += delta;
///     }
///
///     fn can_transition_to(
///         &self,
///         target: &Lamp,
///         context: &LampContext,
///         _parameters: &TransitionParameters<()>,
///     ) -> bool {
///         *target == Lamp::Off && context.lit_for >= Duration::from_secs(1)
///     }
/// }
/// ```
pub trait StateBehavior<S: State, C, P>: Send + Sync {
    /// The state this behavior implements. Fixed for the behavior's lifetime.
    fn state_type(&self) -> S;

    /// Called after the machine has switched into this state.
    fn on_enter(&self, _context: &mut C) {}

    /// Called once per tick while this state is active.
    fn on_update(&self, _context: &mut C, _delta: Duration) {}

    /// Called before the machine leaves this state.
    fn on_exit(&self, _context: &mut C) {}

    /// Whether the machine, currently in this state, may move to `target`.
    fn can_transition_to(&self, target: &S, context: &C, parameters: &TransitionParameters<P>)
        -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PlayerId;
    use crate::state_enum;

    state_enum! {
        enum Phase {
            Warmup,
            Running,
        }
    }

    #[derive(Default)]
    struct Ctx {
        entered: u32,
        exited: u32,
        elapsed: Duration,
    }

    struct Warmup;

    impl StateBehavior<Phase, Ctx, ()> for Warmup {
        fn state_type(&self) -> Phase {
            Phase::Warmup
        }

        fn on_update(&self, context: &mut Ctx, delta: Duration) {
            context.elapsed += delta;
        }

        fn can_transition_to(
            &self,
            target: &Phase,
            context: &Ctx,
            _: &TransitionParameters<()>,
        ) -> bool {
            *target == Phase::Running && context.elapsed >= Duration::from_secs(2)
        }
    }

    #[test]
    fn default_hooks_leave_context_untouched() {
        let behavior = Warmup;
        let mut ctx = Ctx::default();

        behavior.on_enter(&mut ctx);
        behavior.on_exit(&mut ctx);

        assert_eq!(ctx.entered, 0);
        assert_eq!(ctx.exited, 0);
    }

    #[test]
    fn predicate_tracks_context_updates() {
        let behavior = Warmup;
        let mut ctx = Ctx::default();
        let params = TransitionParameters::new(PlayerId(1), ());

        assert!(!behavior.can_transition_to(&Phase::Running, &ctx, &params));

        behavior.on_update(&mut ctx, Duration::from_secs(3));
        assert!(behavior.can_transition_to(&Phase::Running, &ctx, &params));
        assert!(!behavior.can_transition_to(&Phase::Warmup, &ctx, &params));
    }

    #[test]
    fn predicate_is_repeatable() {
        let behavior = Warmup;
        let ctx = Ctx {
            elapsed: Duration::from_secs(5),
            ..Ctx::default()
        };
        let params = TransitionParameters::new(PlayerId(9), ());

        let first = behavior.can_transition_to(&Phase::Running, &ctx, &params);
        let second = behavior.can_transition_to(&Phase::Running, &ctx, &params);
        assert_eq!(first, second);
    }
}
