//! Results of batch operations and read-only plugin views.

use serde::Serialize;
use tether_core::{PluginFailure, PluginState, TetherError};

use crate::registry::RegistryEntry;

/// Outcome of [`PluginManager::load_all`](crate::PluginManager::load_all).
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Resolved load order of the batch.
    pub order: Vec<String>,

    /// Plugins that reached `Loaded`.
    pub loaded: Vec<String>,

    /// Plugins that could not be loaded, with the reason.
    pub failed: Vec<(String, TetherError)>,

    /// Plugins enabled automatically after loading.
    pub enabled: Vec<String>,

    /// Plugins whose automatic enable failed.
    pub activation_failed: Vec<(String, TetherError)>,
}

impl LoadReport {
    /// Returns true if every plugin loaded and every requested enable succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.activation_failed.is_empty()
    }

    /// Returns the load or activation error recorded for a plugin.
    pub fn error_for(&self, name: &str) -> Option<&TetherError> {
        self.failed
            .iter()
            .chain(&self.activation_failed)
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }
}

/// Outcome of [`PluginManager::shutdown`](crate::PluginManager::shutdown).
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Plugins disabled during the sweep, in order.
    pub disabled: Vec<String>,

    /// Plugins unloaded during the sweep, in order.
    pub unloaded: Vec<String>,

    /// Failures collected along the way.
    pub failures: Vec<(String, TetherError)>,
}

impl ShutdownReport {
    /// Returns true if the sweep had nothing to do.
    pub fn is_noop(&self) -> bool {
        self.disabled.is_empty() && self.unloaded.is_empty() && self.failures.is_empty()
    }
}

/// Host-facing description of a registered plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub state: PluginState,
    pub dependencies: Vec<String>,
    pub tags: Vec<String>,
    pub compatible_versions: Vec<String>,
    pub config_schema: Option<serde_json::Value>,
    pub enabled: bool,
    pub priority: u32,
    pub error: Option<PluginFailure>,
}

impl From<&RegistryEntry> for PluginInfo {
    fn from(entry: &RegistryEntry) -> Self {
        let metadata = &entry.metadata;
        Self {
            name: metadata.name.clone(),
            version: metadata.version.clone(),
            author: metadata.author.clone(),
            description: metadata.description.clone(),
            state: entry.state,
            dependencies: metadata.dependencies.clone(),
            tags: metadata.tags.clone(),
            compatible_versions: metadata.compatible_versions.clone(),
            config_schema: metadata.config_schema.clone(),
            enabled: entry.config.enabled,
            priority: entry.config.priority,
            error: entry.error.clone(),
        }
    }
}

/// Filter for [`PluginManager::list`](crate::PluginManager::list).
#[derive(Debug, Clone, Default)]
pub struct PluginFilter {
    pub tag: Option<String>,
    pub state: Option<PluginState>,
}

impl PluginFilter {
    /// Matches every plugin.
    pub fn all() -> Self {
        Self::default()
    }

    /// Keeps plugins carrying the tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Keeps plugins in the state.
    pub fn with_state(mut self, state: PluginState) -> Self {
        self.state = Some(state);
        self
    }

    /// Returns true if the entry passes the filter.
    pub fn matches(&self, entry: &RegistryEntry) -> bool {
        let tag_ok = self
            .tag
            .as_deref()
            .is_none_or(|tag| entry.metadata.has_tag(tag));
        let state_ok = self.state.is_none_or(|state| entry.state == state);
        tag_ok && state_ok
    }
}
