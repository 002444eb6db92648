//! Factories that construct plugin instances from metadata.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::failure::HookError;
use crate::metadata::PluginMetadata;
use crate::plugin::{Plugin, PluginContext};

/// Constructor for a plugin instance.
pub type PluginFactory =
    Arc<dyn Fn(&PluginContext) -> Result<Box<dyn Plugin>, HookError> + Send + Sync>;

/// Host-supplied table of plugin constructors.
///
/// Lookup uses the metadata's `entry_point` first, then its `name`, then
/// the fallback factory if one is set.
#[derive(Clone, Default)]
pub struct PluginFactories {
    factories: HashMap<String, PluginFactory>,
    fallback: Option<PluginFactory>,
}

impl PluginFactories {
    /// Creates an empty factory table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `key`, replacing any previous one.
    pub fn register<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn(&PluginContext) -> Result<Box<dyn Plugin>, HookError> + Send + Sync + 'static,
    {
        self.factories.insert(key.into(), Arc::new(factory));
    }

    /// Registers a factory under `key`.
    pub fn with<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<Box<dyn Plugin>, HookError> + Send + Sync + 'static,
    {
        self.register(key, factory);
        self
    }

    /// Sets the factory used when no key matches.
    pub fn with_fallback<F>(mut self, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> Result<Box<dyn Plugin>, HookError> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(factory));
        self
    }

    /// Finds the factory for the given metadata.
    pub fn get(&self, metadata: &PluginMetadata) -> Option<PluginFactory> {
        self.factories
            .get(metadata.factory_key())
            .or_else(|| self.factories.get(&metadata.name))
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Returns true if a factory exists for the given metadata.
    pub fn contains(&self, metadata: &PluginMetadata) -> bool {
        self.get(metadata).is_some()
    }

    /// Returns the registered keys.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.factories.keys().map(|k| k.as_str()).collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for PluginFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactories")
            .field("keys", &self.keys())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
