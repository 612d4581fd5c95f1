//! Builder for constructing state machines.

use crate::behavior::StateBehavior;
use crate::builder::error::BuildError;
use crate::core::{ParameterVariant, State, StateHistory};
use crate::machine::StateMachine;
use crate::network::{DirectNetworkSimulator, NetworkSimulator};
use crate::registry::{StateRegistry, StateRegistryBuilder};

/// Commits retained in a machine's history unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Builder for constructing state machines with a fluent API.
///
/// Behaviors come either from a prebuilt [`StateRegistry`] or from
/// `register` calls on the builder; in the latter case the registry is
/// validated by [`build`](Self::build). Without an explicit network the
/// machine uses [`DirectNetworkSimulator`]. History keeps the latest
/// [`DEFAULT_HISTORY_LIMIT`] commits unless [`history_limit`](Self::history_limit)
/// says otherwise.
pub struct StateMachineBuilder<S: State, C, P> {
    initial: Option<S>,
    registry: Option<StateRegistry<S, C, P>>,
    behaviors: StateRegistryBuilder<S, C, P>,
    network: Option<Box<dyn NetworkSimulator<S, P>>>,
    history_limit: usize,
}

impl<S, C, P> StateMachineBuilder<S, C, P>
where
    S: State,
    C: 'static,
    P: ParameterVariant,
{
    pub fn new() -> Self {
        Self {
            initial: None,
            registry: None,
            behaviors: StateRegistryBuilder::new(),
            network: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Use an already validated registry. Takes precedence over `register`.
    pub fn registry(mut self, registry: StateRegistry<S, C, P>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a behavior factory for `state`.
    pub fn register<B, F>(mut self, state: S, factory: F) -> Self
    where
        B: StateBehavior<S, C, P> + 'static,
        F: FnOnce() -> B,
    {
        self.behaviors = self.behaviors.register(state, factory);
        self
    }

    /// Set the network simulator.
    pub fn network<N>(mut self, network: N) -> Self
    where
        N: NetworkSimulator<S, P> + 'static,
    {
        self.network = Some(Box::new(network));
        self
    }

    /// Retain at most `limit` committed transitions in the history.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build the state machine.
    ///
    /// Fails if the initial state is missing or the registry is incomplete.
    pub fn build(self) -> Result<StateMachine<S, C, P>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;

        let registry = match self.registry {
            Some(registry) => registry,
            None => self.behaviors.build()?,
        };

        let network = self.network.unwrap_or_else(|| {
            Box::new(DirectNetworkSimulator::new()) as Box<dyn NetworkSimulator<S, P>>
        });

        Ok(StateMachine::from_parts(
            initial,
            registry,
            network,
            StateHistory::bounded(self.history_limit),
        ))
    }
}

impl<S, C, P> Default for StateMachineBuilder<S, C, P>
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
    use crate::registry::RegistrationIssue;
    use crate::state_enum;

    state_enum! {
        enum TestState {
            Initial,
            Processing,
            Complete,
        }
        final: [Complete]
    }

    struct Open(TestState);

    impl StateBehavior<TestState, (), ()> for Open {
        fn state_type(&self) -> TestState {
            self.0
        }

        fn can_transition_to(&self, _: &TestState, _: &(), _: &TransitionParameters<()>) -> bool {
            true
        }
    }

    fn complete() -> StateMachineBuilder<TestState, (), ()> {
        StateMachineBuilder::new()
            .register(TestState::Initial, || Open(TestState::Initial))
            .register(TestState::Processing, || Open(TestState::Processing))
            .register(TestState::Complete, || Open(TestState::Complete))
    }

    #[test]
    fn builder_validates_initial_state() {
        let result = complete().build();
        assert!(matches!(result, Err(BuildError::MissingInitialState)));
    }

    #[test]
    fn builder_validates_registry_eagerly() {
        let result = StateMachineBuilder::<TestState, (), ()>::new()
            .initial(TestState::Initial)
            .register(TestState::Initial, || Open(TestState::Initial))
            .build();

        match result {
            Err(BuildError::Registry(err)) => {
                assert_eq!(err.issues().len(), 2);
                assert!(err
                    .issues()
                    .iter()
                    .all(|i| matches!(i, RegistrationIssue::MissingImplementation { .. })));
            }
            _ => panic!("Expected registry error"),
        }
    }

    #[test]
    fn fluent_api_builds_machine() {
        let machine = complete().initial(TestState::Processing).build().unwrap();
        assert_eq!(machine.current_state(), &TestState::Processing);
    }

    #[test]
    fn history_limit_defaults_and_overrides() {
        let machine = complete().initial(TestState::Initial).build().unwrap();
        assert_eq!(machine.history().limit(), Some(DEFAULT_HISTORY_LIMIT));

        let machine = complete()
            .initial(TestState::Initial)
            .history_limit(16)
            .build()
            .unwrap();
        assert_eq!(machine.history().limit(), Some(16));
    }

    #[test]
    fn prebuilt_registry_is_accepted() {
        let registry = StateRegistry::builder()
            .register_behavior(Open(TestState::Initial))
            .register_behavior(Open(TestState::Processing))
            .register_behavior(Open(TestState::Complete))
            .build()
            .unwrap();

        let machine = StateMachineBuilder::<TestState, (), ()>::new()
            .initial(TestState::Initial)
            .registry(registry)
            .build();

        assert!(machine.is_ok());
    }
}
