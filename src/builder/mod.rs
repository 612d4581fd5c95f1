//! Builder API for ergonomic state machine construction.
//!
//! This module provides the fluent machine builder and the `state_enum!`
//! macro for declaring state enumerations with minimal boilerplate.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use machine::{StateMachineBuilder, DEFAULT_HISTORY_LIMIT};
