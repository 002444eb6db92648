//! The table of loaded plugins and its state-change notifications.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tether_core::{
    Plugin, PluginConfig, PluginContext, PluginFailure, PluginMetadata, PluginState, Result,
    TetherError,
};
use tracing::{debug, warn};

/// Shared handle to a live plugin instance.
pub type PluginHandle = Arc<Mutex<Box<dyn Plugin>>>;

/// Callback invoked after a plugin changes state.
pub type StateObserver = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// One row of the registry.
#[derive(Clone)]
pub struct RegistryEntry {
    /// Plugin metadata.
    pub metadata: Arc<PluginMetadata>,

    /// Current configuration.
    pub config: Arc<PluginConfig>,

    /// Live instance; `None` if construction failed.
    pub instance: Option<PluginHandle>,

    /// Current lifecycle state.
    pub state: PluginState,

    /// Last failure captured from the plugin.
    pub error: Option<PluginFailure>,
}

impl RegistryEntry {
    /// Creates an entry without a recorded failure.
    pub fn new(
        metadata: Arc<PluginMetadata>,
        config: Arc<PluginConfig>,
        instance: Option<PluginHandle>,
        state: PluginState,
    ) -> Self {
        Self {
            metadata,
            config,
            instance,
            state,
            error: None,
        }
    }

    /// Records a failure on the entry.
    pub fn with_error(mut self, failure: PluginFailure) -> Self {
        self.error = Some(failure);
        self
    }

    /// Returns the plugin name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Builds the context handed to the plugin's hooks.
    pub fn context(&self) -> PluginContext {
        PluginContext::new(self.metadata.clone(), self.config.clone())
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.metadata.name)
            .field("state", &self.state)
            .field("config", &self.config)
            .field("has_instance", &self.instance.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// A state transition observed by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub plugin: String,
    pub from: PluginState,
    pub to: PluginState,
}

/// Authoritative table of loaded plugins.
///
/// Every method takes the table lock only for the duration of a single
/// read or update. Observers run after the lock is released; they may
/// read the registry but must not call back into a `PluginManager`.
#[derive(Default)]
pub struct PluginRegistry {
    entries: RwLock<BTreeMap<String, RegistryEntry>>,
    observers: RwLock<Vec<(Option<PluginState>, StateObserver)>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin. Fails if the name is already registered.
    pub fn add(&self, entry: RegistryEntry) -> Result<()> {
        let change = {
            let mut entries = self.entries.write();
            let name = entry.metadata.name.clone();

            if entries.contains_key(&name) {
                return Err(TetherError::AlreadyLoaded(name));
            }

            let change = StateChange {
                plugin: name.clone(),
                from: PluginState::Unloaded,
                to: entry.state,
            };
            entries.insert(name, entry);
            change
        };

        debug!(plugin = %change.plugin, state = %change.to, "Registered plugin");
        self.notify(&change);
        Ok(())
    }

    /// Removes a plugin, returning its entry.
    pub fn remove(&self, name: &str) -> Option<RegistryEntry> {
        let entry = self.entries.write().remove(name)?;

        debug!(plugin = %name, "Unregistered plugin");
        self.notify(&StateChange {
            plugin: name.to_string(),
            from: entry.state,
            to: PluginState::Unloaded,
        });
        Some(entry)
    }

    /// Returns a copy of a plugin's entry.
    pub fn get(&self, name: &str) -> Option<RegistryEntry> {
        self.entries.read().get(name).cloned()
    }

    /// Returns true if the plugin is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Returns a plugin's state, if registered.
    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.entries.read().get(name).map(|e| e.state)
    }

    /// Returns a snapshot of every entry, keyed by name.
    pub fn all(&self) -> BTreeMap<String, RegistryEntry> {
        self.entries.read().clone()
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of registered plugins.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sets a plugin's state and notifies observers if it changed.
    pub fn set_state(&self, name: &str, state: PluginState) -> Result<()> {
        let from = {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| TetherError::NotFound(name.to_string()))?;
            std::mem::replace(&mut entry.state, state)
        };

        if from != state {
            self.notify(&StateChange {
                plugin: name.to_string(),
                from,
                to: state,
            });
        }
        Ok(())
    }

    /// Records a failure and moves the plugin to `Error`.
    pub fn record_failure(&self, name: &str, failure: PluginFailure) -> Result<()> {
        {
            let mut entries = self.entries.write();
            let entry = entries
                .get_mut(name)
                .ok_or_else(|| TetherError::NotFound(name.to_string()))?;
            entry.error = Some(failure);
        }
        self.set_state(name, PluginState::Error)
    }

    /// Replaces a plugin's configuration.
    pub fn set_config(&self, name: &str, config: Arc<PluginConfig>) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| TetherError::NotFound(name.to_string()))?;
        entry.config = config;
        Ok(())
    }

    /// Returns the enabled plugins that declare `name` as a dependency, sorted.
    pub fn enabled_dependents(&self, name: &str) -> Vec<String> {
        self.entries
            .read()
            .values()
            .filter(|e| e.state == PluginState::Enabled)
            .filter(|e| e.metadata.name != name && e.metadata.depends_on(name))
            .map(|e| e.metadata.name.clone())
            .collect()
    }

    /// Returns the names of plugins in the given state, sorted.
    pub fn in_state(&self, state: PluginState) -> Vec<String> {
        self.entries
            .read()
            .values()
            .filter(|e| e.state == state)
            .map(|e| e.metadata.name.clone())
            .collect()
    }

    /// Registers a callback for every state change.
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.observers.write().push((None, Arc::new(observer)));
    }

    /// Registers a callback for changes into `state`.
    pub fn observe_state<F>(&self, state: PluginState, observer: F)
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.observers.write().push((Some(state), Arc::new(observer)));
    }

    fn notify(&self, change: &StateChange) {
        let observers: Vec<StateObserver> = self
            .observers
            .read()
            .iter()
            .filter(|(state, _)| state.is_none_or(|s| s == change.to))
            .map(|(_, observer)| observer.clone())
            .collect();

        for observer in observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(change))).is_err() {
                warn!(
                    plugin = %change.plugin,
                    from = %change.from,
                    to = %change.to,
                    "State observer panicked"
                );
            }
        }
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("entries", &*self.entries.read())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}
