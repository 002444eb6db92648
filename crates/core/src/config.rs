//! Per-plugin configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Priority given to plugins that do not set one.
pub const DEFAULT_PRIORITY: u32 = 100;

/// Configuration for a plugin instance, owned by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Enable the plugin automatically once it is loaded.
    #[serde(default)]
    pub enabled: bool,

    /// Load priority; lower values load first among otherwise equal plugins.
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Plugin-specific settings, passed to the plugin verbatim.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

fn default_priority() -> u32 {
    DEFAULT_PRIORITY
}

impl PluginConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the auto-enable flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Adds a setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Gets a setting by key.
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: DEFAULT_PRIORITY,
            settings: BTreeMap::new(),
        }
    }
}
