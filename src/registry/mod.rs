//! State registry: exactly one behavior per enumerated state.
//!
//! Registration is explicit. The caller maps every value of the state
//! enumeration to a behavior factory, and [`StateRegistryBuilder::build`]
//! checks the mapping eagerly so configuration mistakes surface before the
//! first transition instead of in the middle of one.
//!
//! Validation accumulates every problem via Stillwater's `Validation`, so a
//! registry missing three states reports all three at once.

pub mod error;

pub use error::{RegistrationIssue, RegistryError};

use crate::behavior::StateBehavior;
use crate::core::{ParameterVariant, State};
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::debug;

type BoxedBehavior<S, C, P> = Box<dyn StateBehavior<S, C, P>>;
type Check = Validation<(), NonEmptyVec<RegistrationIssue>>;

/// Complete mapping from states to their behaviors.
///
/// A registry can only be obtained through [`StateRegistryBuilder::build`],
/// which guarantees that every value of `S::variants()` has a behavior.
///
/// # Example
///
/// ```rust
/// use relay_fsm::behavior::StateBehavior;
/// use relay_fsm::core::TransitionParameters;
/// use relay_fsm::registry::StateRegistry;
/// use relay_fsm::state_enum;
///
/// state_enum! {
///     enum Switch {
///         Up,
///         Down,
///     }
/// }
///
/// struct Toggle(Switch);
///
/// impl StateBehavior<Switch, (), ()> for Toggle {
///     fn state_type(&self) -> Switch {
///         self.0
///     }
///
///     fn can_transition_to(&self, target: &Switch, _: &(), _: &TransitionParameters<()>) -> bool {
///         *target != self.0
///     }
/// }
///
/// let incomplete = StateRegistry::<Switch, (), ()>::builder()
///     .register(Switch::Up, || Toggle(Switch::Up))
///     .build();
/// assert_eq!(incomplete.err().unwrap().missing_states(), vec!["Down"]);
///
/// let registry = StateRegistry::<Switch, (), ()>::builder()
///     .register(Switch::Up, || Toggle(Switch::Up))
///     .register(Switch::Down, || Toggle(Switch::Down))
///     .build()
///     .expect("every state registered");
/// assert_eq!(registry.len(), 2);
/// ```
pub struct StateRegistry<S: State, C, P> {
    behaviors: HashMap<S, BoxedBehavior<S, C, P>>,
}

impl<S, C, P> StateRegistry<S, C, P>
where
    S: State,
    C: 'static,
    P: ParameterVariant,
{
    pub fn builder() -> StateRegistryBuilder<S, C, P> {
        StateRegistryBuilder::new()
    }

    /// Behavior for `state`.
    ///
    /// # Panics
    ///
    /// Panics with "missing state implementation" if `state` has no
    /// behavior. A built registry covers every enumerated value, so this
    /// only fires on a broken `State::variants` implementation.
    pub fn get(&self, state: &S) -> &dyn StateBehavior<S, C, P> {
        match self.behaviors.get(state) {
            Some(behavior) => behavior.as_ref(),
            None => panic!("missing state implementation for '{}'", state.name()),
        }
    }

    pub fn contains(&self, state: &S) -> bool {
        self.behaviors.contains_key(state)
    }

    /// Registered states in enumeration order.
    pub fn states(&self) -> Vec<S> {
        S::variants()
            .into_iter()
            .filter(|state| self.behaviors.contains_key(state))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}

/// Builder collecting explicit state-to-behavior registrations.
pub struct StateRegistryBuilder<S: State, C, P> {
    entries: Vec<(S, BoxedBehavior<S, C, P>)>,
}

impl<S, C, P> StateRegistryBuilder<S, C, P>
where
    S: State,
    C: 'static,
    P: ParameterVariant,
{
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register the behavior produced by `factory` for `state`.
    ///
    /// The factory runs immediately; behaviors live as long as the registry.
    pub fn register<B, F>(mut self, state: S, factory: F) -> Self
    where
        B: StateBehavior<S, C, P> + 'static,
        F: FnOnce() -> B,
    {
        self.entries.push((state, Box::new(factory())));
        self
    }

    /// Register a behavior under the state it reports.
    pub fn register_behavior<B>(mut self, behavior: B) -> Self
    where
        B: StateBehavior<S, C, P> + 'static,
    {
        self.entries.push((behavior.state_type(), Box::new(behavior)));
        self
    }

    /// Validate and build the registry.
    ///
    /// Fails with every issue found: enumerated states without a behavior,
    /// behaviors whose `state_type` disagrees with their key and states
    /// registered twice.
    pub fn build(self) -> Result<StateRegistry<S, C, P>, RegistryError> {
        let mut checks: Vec<Check> = Vec::new();
        let mut seen: HashSet<S> = HashSet::new();

        for (state, behavior) in &self.entries {
            let reported = behavior.state_type();
            checks.push(if reported == *state {
                Validation::success(())
            } else {
                Validation::fail(RegistrationIssue::StateTypeMismatch {
                    registered_as: state.name().to_string(),
                    reported: reported.name().to_string(),
                })
            });

            checks.push(if seen.insert(state.clone()) {
                Validation::success(())
            } else {
                Validation::fail(RegistrationIssue::DuplicateRegistration {
                    state: state.name().to_string(),
                })
            });
        }

        for state in S::variants() {
            checks.push(if seen.contains(&state) {
                Validation::success(())
            } else {
                Validation::fail(RegistrationIssue::MissingImplementation {
                    state: state.name().to_string(),
                })
            });
        }

        match Validation::all_vec(checks).map(|_| ()) {
            Validation::Success(()) => {
                let behaviors: HashMap<_, _> = self.entries.into_iter().collect();
                debug!(states = behaviors.len(), "State registry validated");
                Ok(StateRegistry { behaviors })
            }
            Validation::Failure(issues) => {
                Err(RegistryError::Invalid(issues.iter().cloned().collect()))
            }
        }
    }
}

impl<S, C, P> Default for StateRegistryBuilder<S, C, P>
where
    S: State,
    C: 'static,
    P: ParameterVariant,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TransitionParameters;
    use crate::state_enum;

    state_enum! {
        enum Light {
            Red,
            Yellow,
            Green,
        }
    }

    struct Fixed(Light);

    impl StateBehavior<Light, (), ()> for Fixed {
        fn state_type(&self) -> Light {
            self.0
        }

        fn can_transition_to(&self, _: &Light, _: &(), _: &TransitionParameters<()>) -> bool {
            true
        }
    }

    fn builder() -> StateRegistryBuilder<Light, (), ()> {
        StateRegistry::builder()
    }

    #[test]
    fn complete_registry_builds() {
        let registry = builder()
            .register(Light::Red, || Fixed(Light::Red))
            .register(Light::Yellow, || Fixed(Light::Yellow))
            .register(Light::Green, || Fixed(Light::Green))
            .build()
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(&Light::Yellow).state_type(), Light::Yellow);
        assert_eq!(registry.states(), Light::variants());
    }

    #[test]
    fn missing_states_are_all_reported() {
        let err = builder()
            .register(Light::Red, || Fixed(Light::Red))
            .build()
            .err()
            .unwrap();

        assert_eq!(err.missing_states(), vec!["Yellow", "Green"]);
    }

    #[test]
    fn empty_registry_fails() {
        let err = builder().build().err().unwrap();
        assert_eq!(err.issues().len(), 3);
    }

    #[test]
    fn mismatched_state_type_is_rejected() {
        let err = builder()
            .register(Light::Red, || Fixed(Light::Red))
            .register(Light::Yellow, || Fixed(Light::Green))
            .register(Light::Green, || Fixed(Light::Green))
            .build()
            .err()
            .unwrap();

        assert_eq!(
            err.issues(),
            &[RegistrationIssue::StateTypeMismatch {
                registered_as: "Yellow".to_string(),
                reported: "Green".to_string(),
            }]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = builder()
            .register_behavior(Fixed(Light::Red))
            .register_behavior(Fixed(Light::Red))
            .register_behavior(Fixed(Light::Yellow))
            .register_behavior(Fixed(Light::Green))
            .build()
            .err()
            .unwrap();

        assert!(err
            .issues()
            .iter()
            .any(|issue| matches!(issue, RegistrationIssue::DuplicateRegistration { .. })));
    }

    #[test]
    fn error_message_lists_every_issue() {
        let err = builder()
            .register(Light::Red, || Fixed(Light::Red))
            .build()
            .err()
            .unwrap();

        assert_eq!(
            err.to_string(),
            "invalid state registry: missing state implementation for 'Yellow'; \
             missing state implementation for 'Green'"
        );
    }
}
