//! Error types for Tether.

use thiserror::Error;

use crate::failure::PluginFailure;
use crate::state::{Operation, PluginState};

/// Result type alias for Tether operations.
pub type Result<T> = std::result::Result<T, TetherError>;

/// Main error type for Tether.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TetherError {
    #[error("Plugin '{plugin}' depends on '{dependency}' which is not available")]
    MissingDependency { plugin: String, dependency: String },

    #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("Plugin '{0}' is declared more than once")]
    DuplicatePlugin(String),

    #[error("Invalid metadata for plugin '{name}': {reason}")]
    InvalidMetadata { name: String, reason: String },

    #[error("Plugin '{0}' not found")]
    NotFound(String),

    #[error("Plugin '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error("No factory registered for plugin '{0}'")]
    FactoryNotFound(String),

    #[error("Cannot {operation} '{plugin}': dependency '{dependency}' is {}", describe_state(.state))]
    DependencyNotReady {
        plugin: String,
        operation: Operation,
        dependency: String,
        state: Option<PluginState>,
    },

    #[error("Cannot {operation} '{plugin}': still required by {}", .dependents.join(", "))]
    PluginInUse {
        plugin: String,
        operation: Operation,
        dependents: Vec<String>,
    },

    #[error("Cannot {operation} '{plugin}' while it is {state}")]
    InvalidTransition {
        plugin: String,
        operation: Operation,
        state: PluginState,
    },

    #[error("Plugin '{plugin}' failed: {failure}")]
    Hook {
        plugin: String,
        failure: PluginFailure,
    },
}

fn describe_state(state: &Option<PluginState>) -> String {
    match state {
        Some(state) => state.to_string(),
        None => "not loaded".to_string(),
    }
}

/// Coarse classification of a [`TetherError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No safe load order exists for a batch.
    Resolution,
    /// The named plugin is not registered.
    NotFound,
    /// A guard rejected the operation before any hook ran.
    Precondition,
    /// A plugin hook returned an error or panicked.
    Hook,
}

impl TetherError {
    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            TetherError::MissingDependency { .. }
            | TetherError::CircularDependency { .. }
            | TetherError::DuplicatePlugin(_)
            | TetherError::InvalidMetadata { .. } => ErrorCategory::Resolution,
            TetherError::NotFound(_) => ErrorCategory::NotFound,
            TetherError::AlreadyLoaded(_)
            | TetherError::FactoryNotFound(_)
            | TetherError::DependencyNotReady { .. }
            | TetherError::PluginInUse { .. }
            | TetherError::InvalidTransition { .. } => ErrorCategory::Precondition,
            TetherError::Hook { .. } => ErrorCategory::Hook,
        }
    }

    /// Returns the plugin failure carried by a hook error.
    pub fn failure(&self) -> Option<&PluginFailure> {
        match self {
            TetherError::Hook { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
