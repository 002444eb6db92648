//! Tether Core - Core types and traits for the Tether plugin system.

mod config;
mod error;
mod factory;
mod failure;
mod metadata;
mod plugin;
mod state;

pub use config::{DEFAULT_PRIORITY, PluginConfig};
pub use error::{ErrorCategory, Result, TetherError};
pub use factory::{PluginFactories, PluginFactory};
pub use failure::{HookError, HookResult, PluginFailure};
pub use metadata::PluginMetadata;
pub use plugin::{HookPlugin, Plugin, PluginContext};
pub use state::{Operation, PluginState};
