//! Hook errors and captured plugin failures.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Operation;

/// Error returned by a plugin hook or factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    /// Creates a hook error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for HookError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type for plugin hooks.
pub type HookResult = std::result::Result<(), HookError>;

/// A failure captured from a plugin during a lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFailure {
    /// Operation during which the failure happened.
    pub operation: Operation,

    /// Error message reported by the plugin.
    pub message: String,

    /// True if the plugin panicked instead of returning an error.
    pub panicked: bool,
}

impl PluginFailure {
    /// A failure returned as an error by the plugin.
    pub fn returned(operation: Operation, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
            panicked: false,
        }
    }

    /// A failure caused by a panic inside the plugin.
    pub fn panicked(operation: Operation, payload: Box<dyn Any + Send>) -> Self {
        Self {
            operation,
            message: panic_message(payload.as_ref()),
            panicked: true,
        }
    }
}

impl fmt::Display for PluginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.panicked { "panicked" } else { "failed" };
        write!(
            f,
            "{} {}: {}",
            self.operation.hook_name(),
            verb,
            self.message
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_error_conversions() {
        let err: HookError = "boom".into();
        assert_eq!(err.message(), "boom");

        let io = std::io::Error::other("disk gone");
        assert_eq!(HookError::from(io).to_string(), "disk gone");
    }

    #[test]
    fn test_failure_display() {
        let failure = PluginFailure::returned(Operation::Load, "boom");
        assert_eq!(failure.to_string(), "on_load failed: boom");
    }

    #[test]
    fn test_panic_payloads() {
        let failure = PluginFailure::panicked(Operation::Enable, Box::new("static"));
        assert_eq!(failure.message, "static");
        assert!(failure.panicked);

        let failure = PluginFailure::panicked(Operation::Enable, Box::new(String::from("owned")));
        assert_eq!(failure.message, "owned");

        let failure = PluginFailure::panicked(Operation::Enable, Box::new(42_u8));
        assert_eq!(failure.message, "unknown panic payload");
        assert_eq!(failure.to_string(), "on_enable panicked: unknown panic payload");
    }
}
