//! Committed transition history.
//!
//! Every transition that passes authorization is recorded here together with
//! the player that requested it. Rejected and lost requests never appear.

use super::params::PlayerId;
use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single committed transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateTransition<S: State> {
    /// The state being transitioned from
    pub from: S,
    /// The state being transitioned to
    pub to: S,
    /// Wall-clock time of the commit
    pub timestamp: DateTime<Utc>,
    /// Player whose request committed
    pub player: PlayerId,
}

/// Ordered history of committed transitions.
///
/// `record` is immutable and returns a new history with the transition
/// appended. Long-running owners use [`push`](Self::push) instead, which
/// appends in place. A history may be bounded: once it holds `limit`
/// transitions, each new one evicts the oldest, while
/// [`recorded`](Self::recorded) keeps counting every commit.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use relay_fsm::core::{PlayerId, StateHistory, StateTransition};
/// use relay_fsm::state_enum;
///
/// state_enum! {
///     enum Phase {
///         One,
///         Two,
///         Three,
///     }
/// }
///
/// let history = StateHistory::new()
///     .record(StateTransition {
///         from: Phase::One,
///         to: Phase::Two,
///         timestamp: Utc::now(),
///         player: PlayerId(1),
///     })
///     .record(StateTransition {
///         from: Phase::Two,
///         to: Phase::Three,
///         timestamp: Utc::now(),
///         player: PlayerId(2),
///     });
///
/// assert_eq!(history.get_path(), vec![&Phase::One, &Phase::Two, &Phase::Three]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct StateHistory<S: State> {
    transitions: VecDeque<StateTransition<S>>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    recorded: u64,
}

impl<S: State> Default for StateHistory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateHistory<S> {
    /// Create a new empty, unbounded history.
    pub fn new() -> Self {
        Self {
            transitions: VecDeque::new(),
            limit: None,
            recorded: 0,
        }
    }

    /// Create a history that retains at most the `limit` latest transitions.
    /// A limit of zero is treated as one.
    pub fn bounded(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::new()
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Record a transition, returning a new history.
    ///
    /// The existing history is left untouched.
    pub fn record(&self, transition: StateTransition<S>) -> Self {
        let mut next = self.clone();
        next.push(transition);
        next
    }

    /// Append a transition in place, evicting the oldest when full.
    pub fn push(&mut self, transition: StateTransition<S>) {
        if let Some(limit) = self.limit {
            while self.transitions.len() >= limit {
                self.transitions.pop_front();
            }
        }
        self.transitions.push_back(transition);
        self.recorded += 1;
    }

    /// Get the path of states traversed.
    ///
    /// Returns the first retained `from` state followed by the `to` state of
    /// each transition. Empty when nothing has committed.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::with_capacity(self.transitions.len() + 1);
        if let Some(first) = self.transitions.front() {
            path.push(&first.from);
        }
        for transition in &self.transitions {
            path.push(&transition.to);
        }
        path
    }

    /// Time between the first and last retained commit, `None` when empty.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.front(), self.transitions.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    /// Commits attributed to `player`.
    pub fn by_player(&self, player: PlayerId) -> impl Iterator<Item = &StateTransition<S>> {
        self.transitions.iter().filter(move |t| t.player == player)
    }

    /// Retained transitions, oldest first.
    pub fn transitions(
        &self,
    ) -> impl DoubleEndedIterator<Item = &StateTransition<S>> + ExactSizeIterator {
        self.transitions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&StateTransition<S>> {
        self.transitions.get(index)
    }

    /// Retained transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Every commit ever recorded, including evicted ones.
    pub fn recorded(&self) -> u64 {
        self.recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
    enum TestState {
        Initial,
        Processing,
        Complete,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Initial => "Initial",
                Self::Processing => "Processing",
                Self::Complete => "Complete",
            }
        }

        fn variants() -> Vec<Self> {
            vec![Self::Initial, Self::Processing, Self::Complete]
        }
    }

    fn transition(from: TestState, to: TestState, player: u32) -> StateTransition<TestState> {
        StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            player: PlayerId(player),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: StateHistory<TestState> = StateHistory::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_is_immutable() {
        let history = StateHistory::new();
        let new_history = history.record(transition(TestState::Initial, TestState::Processing, 1));

        assert_eq!(history.len(), 0);
        assert_eq!(new_history.len(), 1);
    }

    #[test]
    fn get_path_returns_state_sequence() {
        let history = StateHistory::new()
            .record(transition(TestState::Initial, TestState::Processing, 1))
            .record(transition(TestState::Processing, TestState::Complete, 2));

        let path = history.get_path();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], &TestState::Initial);
        assert_eq!(path[1], &TestState::Processing);
        assert_eq!(path[2], &TestState::Complete);
    }

    #[test]
    fn by_player_filters_commits() {
        let history = StateHistory::new()
            .record(transition(TestState::Initial, TestState::Processing, 1))
            .record(transition(TestState::Processing, TestState::Complete, 2));

        let player_two: Vec<_> = history.by_player(PlayerId(2)).collect();
        assert_eq!(player_two.len(), 1);
        assert_eq!(player_two[0].to, TestState::Complete);
    }

    #[test]
    fn single_transition_has_duration_zero() {
        let history =
            StateHistory::new().record(transition(TestState::Initial, TestState::Processing, 1));
        assert_eq!(history.duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn history_serializes_correctly() {
        let history =
            StateHistory::new().record(transition(TestState::Initial, TestState::Processing, 4));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: StateHistory<TestState> = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.len(), 1);
        assert_eq!(deserialized.get(0).map(|t| t.player), Some(PlayerId(4)));
        assert_eq!(deserialized.recorded(), 1);
    }

    #[test]
    fn push_appends_in_place() {
        let mut history = StateHistory::new();
        history.push(transition(TestState::Initial, TestState::Processing, 1));
        history.push(transition(TestState::Processing, TestState::Complete, 1));

        assert_eq!(history.len(), 2);
        assert_eq!(history.recorded(), 2);
        assert_eq!(history.limit(), None);
    }

    #[test]
    fn bounded_history_evicts_oldest() {
        let mut history = StateHistory::bounded(2);
        for i in 0..3000 {
            let (from, to) = if i % 2 == 0 {
                (TestState::Initial, TestState::Processing)
            } else {
                (TestState::Processing, TestState::Initial)
            };
            history.push(transition(from, to, i));
        }

        assert_eq!(history.len(), 2);
        assert_eq!(history.recorded(), 3000);
        let players: Vec<_> = history.transitions().map(|t| t.player).collect();
        assert_eq!(players, vec![PlayerId(2998), PlayerId(2999)]);
        assert_eq!(history.get_path().len(), 3);
    }

    #[test]
    fn zero_limit_keeps_latest_transition() {
        let history = StateHistory::bounded(0)
            .record(transition(TestState::Initial, TestState::Processing, 1))
            .record(transition(TestState::Processing, TestState::Complete, 2));

        assert_eq!(history.len(), 1);
        assert_eq!(history.get(0).map(|t| t.player), Some(PlayerId(2)));
    }
}
