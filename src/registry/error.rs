//! Registry configuration errors.

use thiserror::Error;

/// A single problem found while validating a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistrationIssue {
    #[error("missing state implementation for '{state}'")]
    MissingImplementation { state: String },

    #[error("behavior registered for '{registered_as}' reports state '{reported}'")]
    StateTypeMismatch {
        registered_as: String,
        reported: String,
    },

    #[error("state '{state}' registered more than once")]
    DuplicateRegistration { state: String },
}

/// Errors returned when building a [`StateRegistry`](super::StateRegistry).
///
/// Every issue found is reported, not just the first one.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid state registry: {}", summarize(.0))]
    Invalid(Vec<RegistrationIssue>),
}

impl RegistryError {
    pub fn issues(&self) -> &[RegistrationIssue] {
        match self {
            Self::Invalid(issues) => issues,
        }
    }

    /// Names of enumerated states that have no behavior.
    pub fn missing_states(&self) -> Vec<&str> {
        self.issues()
            .iter()
            .filter_map(|issue| match issue {
                RegistrationIssue::MissingImplementation { state } => Some(state.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn summarize(issues: &[RegistrationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
