//! Plugin manager: the façade hosts use to drive plugin lifecycles.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tether_core::{
    Operation, Plugin, PluginConfig, PluginContext, PluginFactories, PluginFailure,
    PluginMetadata, PluginState, Result, TetherError,
};
use tracing::{debug, error, info, warn};

use crate::registry::{PluginRegistry, RegistryEntry, StateChange};
use crate::report::{LoadReport, PluginFilter, PluginInfo, ShutdownReport};
use crate::resolver::DependencyResolver;

/// Orchestrates loading, enabling, disabling, configuring and unloading
/// of plugins.
///
/// Mutating operations are serialized by an internal lock, so the manager
/// can be shared between threads. Hooks run on the calling thread, outside
/// the registry lock; a hook that blocks holds up other mutating calls but
/// not registry reads.
///
/// The operation lock is reentrant: a hook may call back into the manager
/// to act on other plugins. A hook must not operate on its own plugin,
/// whose instance is locked for the duration of the hook.
pub struct PluginManager {
    /// Table of loaded plugins.
    registry: PluginRegistry,

    /// Constructors for plugin instances.
    factories: PluginFactories,

    /// Configs stored for plugins that are not currently loaded.
    pending_configs: Mutex<HashMap<String, PluginConfig>>,

    /// Enable plugins whose config says so at the end of `load_all`.
    auto_enable: bool,

    /// Serializes mutating operations; reentrant for calls made from hooks.
    operations: ReentrantMutex<()>,
}

impl PluginManager {
    /// Creates a manager using the given factories.
    pub fn new(factories: PluginFactories) -> Self {
        Self {
            registry: PluginRegistry::new(),
            factories,
            pending_configs: Mutex::new(HashMap::new()),
            auto_enable: true,
            operations: ReentrantMutex::new(()),
        }
    }

    /// Enables or disables automatic activation after `load_all`.
    pub fn with_auto_enable(mut self, enabled: bool) -> Self {
        self.auto_enable = enabled;
        self
    }

    /// Registers a state-change observer on the registry.
    pub fn with_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.registry.observe(observer);
        self
    }

    /// Returns the underlying registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Resolves a load order for `plugins` and loads each one in turn.
    ///
    /// Resolution errors (missing dependency, cycle, duplicate or invalid
    /// metadata) abort the batch before any plugin is touched. Failures of
    /// individual plugins are collected in the report.
    pub fn load_all(
        &self,
        plugins: Vec<PluginMetadata>,
        configs: HashMap<String, PluginConfig>,
    ) -> Result<LoadReport> {
        let _guard = self.operations.lock();

        let mut effective: HashMap<String, PluginConfig> = {
            let pending = self.pending_configs.lock();
            plugins
                .iter()
                .map(|m| {
                    let config = configs
                        .get(&m.name)
                        .or_else(|| pending.get(&m.name))
                        .cloned()
                        .unwrap_or_default();
                    (m.name.clone(), config)
                })
                .collect()
        };

        let resolver = DependencyResolver::new().with_available(self.registry.names());
        let order = resolver.resolve(&plugins, &effective).inspect_err(|e| {
            error!(error = %e, "Failed to resolve plugin dependencies");
        })?;

        let mut by_name: HashMap<String, PluginMetadata> = plugins
            .into_iter()
            .map(|m| (m.name.clone(), m))
            .collect();

        let mut report = LoadReport {
            order: order.clone(),
            ..LoadReport::default()
        };

        for name in &order {
            let Some(metadata) = by_name.remove(name) else {
                continue;
            };
            let config = effective.remove(name).unwrap_or_default();

            match self.load_locked(metadata, config) {
                Ok(()) => report.loaded.push(name.clone()),
                Err(e) => report.failed.push((name.clone(), e)),
            }
        }

        if self.auto_enable {
            for name in report.loaded.clone() {
                let wanted = self
                    .registry
                    .get(&name)
                    .is_some_and(|e| e.config.enabled && e.state == PluginState::Loaded);
                if !wanted {
                    continue;
                }

                match self.enable_locked(&name) {
                    Ok(()) => report.enabled.push(name),
                    Err(e) => {
                        warn!(plugin = %name, error = %e, "Automatic enable failed");
                        report.activation_failed.push((name, e));
                    }
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            enabled = report.enabled.len(),
            "Plugin batch processed"
        );
        Ok(report)
    }

    /// Loads a single plugin.
    ///
    /// Every dependency must already be registered and not in `Error`.
    /// `config` defaults to a stored pending config, then to the default.
    /// With auto-enable on, a config that says `enabled` also enables the
    /// plugin; a failed enable is logged and does not fail the load.
    pub fn load(&self, metadata: PluginMetadata, config: Option<PluginConfig>) -> Result<()> {
        let _guard = self.operations.lock();

        let config = config
            .or_else(|| self.pending_configs.lock().get(&metadata.name).cloned())
            .unwrap_or_default();
        let name = metadata.name.clone();
        let enable = self.auto_enable && config.enabled;

        self.load_locked(metadata, config)
            .inspect_err(|e| log_rejection(Operation::Load, &name, e))?;

        if enable {
            if let Err(e) = self.enable_locked(&name) {
                warn!(plugin = %name, error = %e, "Automatic enable failed");
            }
        }
        Ok(())
    }

    /// Enables a plugin. All of its dependencies must be enabled.
    pub fn enable(&self, name: &str) -> Result<()> {
        let _guard = self.operations.lock();
        self.enable_locked(name)
            .inspect_err(|e| log_rejection(Operation::Enable, name, e))
    }

    /// Disables a plugin. No enabled plugin may depend on it.
    pub fn disable(&self, name: &str) -> Result<()> {
        let _guard = self.operations.lock();
        self.disable_locked(name)
            .inspect_err(|e| log_rejection(Operation::Disable, name, e))
    }

    /// Unloads a plugin, disabling it first if needed. No enabled plugin
    /// may depend on it. The plugin's config is kept for a later load.
    pub fn unload(&self, name: &str) -> Result<()> {
        let _guard = self.operations.lock();
        self.unload_locked(name, false)
            .inspect_err(|e| log_rejection(Operation::Unload, name, e))
    }

    /// Replaces a plugin's configuration.
    ///
    /// A registered plugin with a live instance gets `on_config_change`
    /// with the new config. For a name that is not registered the config
    /// is stored and used by the next load.
    pub fn configure(&self, name: &str, config: PluginConfig) -> Result<()> {
        let _guard = self.operations.lock();

        let Some(entry) = self.registry.get(name) else {
            self.pending_configs.lock().insert(name.to_string(), config);
            info!(plugin = %name, "Stored configuration for unloaded plugin");
            return Ok(());
        };

        let config = Arc::new(config);
        self.registry.set_config(name, config.clone())?;

        let entry = RegistryEntry { config, ..entry };
        if entry.instance.is_some() {
            self.run_hook(&entry, Operation::Configure)?;
        }

        info!(plugin = %name, state = %entry.state, "Plugin configuration updated");
        Ok(())
    }

    /// Disables every enabled plugin, then unloads every plugin, dependents
    /// before their dependencies.
    ///
    /// Best effort: failures are collected and the sweep continues. Every
    /// entry is removed, so a second call does nothing.
    pub fn shutdown(&self) -> ShutdownReport {
        let _guard = self.operations.lock();
        let mut report = ShutdownReport::default();

        let entries = self.registry.all();
        if entries.is_empty() {
            debug!("Plugin manager already shut down");
            return report;
        }

        info!(plugins = entries.len(), "Shutting down plugin manager");
        let order = teardown_order(entries.values());

        for name in &order {
            if self.registry.state(name) != Some(PluginState::Enabled) {
                continue;
            }
            match self.disable_locked(name) {
                Ok(()) => report.disabled.push(name.clone()),
                Err(e) => {
                    error!(plugin = %name, error = %e, "Failed to disable plugin during shutdown");
                    report.failures.push((name.clone(), e));
                }
            }
        }

        for name in &order {
            if !self.registry.contains(name) {
                continue;
            }
            match self.unload_locked(name, true) {
                Ok(()) => report.unloaded.push(name.clone()),
                Err(e) => {
                    error!(plugin = %name, error = %e, "Failed to unload plugin during shutdown");
                    report.failures.push((name.clone(), e));
                }
            }
        }

        info!(
            disabled = report.disabled.len(),
            unloaded = report.unloaded.len(),
            failures = report.failures.len(),
            "Plugin manager shutdown complete"
        );
        report
    }

    /// Returns information about a plugin.
    pub fn info(&self, name: &str) -> Option<PluginInfo> {
        self.registry.get(name).map(|e| PluginInfo::from(&e))
    }

    /// Lists plugins matching the filter, by priority then name.
    pub fn list(&self, filter: &PluginFilter) -> Vec<PluginInfo> {
        let mut plugins: Vec<PluginInfo> = self
            .registry
            .all()
            .values()
            .filter(|e| filter.matches(e))
            .map(PluginInfo::from)
            .collect();

        plugins.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        plugins
    }

    /// Returns the names of enabled plugins, sorted.
    pub fn enabled(&self) -> Vec<String> {
        self.registry.in_state(PluginState::Enabled)
    }

    /// Returns a plugin's state. Unregistered plugins are `None`.
    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.registry.state(name)
    }

    /// Returns the last failure captured from a plugin.
    pub fn get_error(&self, name: &str) -> Option<PluginFailure> {
        self.registry.get(name).and_then(|e| e.error)
    }

    /// Returns the config stored for a plugin that is not loaded.
    pub fn pending_config(&self, name: &str) -> Option<PluginConfig> {
        self.pending_configs.lock().get(name).cloned()
    }

    fn entry(&self, name: &str) -> Result<RegistryEntry> {
        self.registry
            .get(name)
            .ok_or_else(|| TetherError::NotFound(name.to_string()))
    }

    fn load_locked(&self, metadata: PluginMetadata, config: PluginConfig) -> Result<()> {
        metadata.validate()?;
        let name = metadata.name.clone();

        if self.registry.contains(&name) {
            return Err(TetherError::AlreadyLoaded(name));
        }

        for dep in metadata.unique_dependencies() {
            match self.registry.state(dep) {
                Some(state) if state != PluginState::Error => {}
                state => {
                    return Err(TetherError::DependencyNotReady {
                        plugin: name,
                        operation: Operation::Load,
                        dependency: dep.to_string(),
                        state,
                    });
                }
            }
        }

        let factory = self
            .factories
            .get(&metadata)
            .ok_or_else(|| TetherError::FactoryNotFound(name.clone()))?;

        self.pending_configs.lock().remove(&name);

        let version = metadata.version.clone();
        let metadata = Arc::new(metadata);
        let config = Arc::new(config);
        let ctx = PluginContext::new(metadata.clone(), config.clone());

        let constructed = panic::catch_unwind(AssertUnwindSafe(|| factory(&ctx)));
        let mut instance = match constructed {
            Ok(Ok(instance)) => instance,
            Ok(Err(e)) => {
                let failure = PluginFailure::returned(Operation::Load, e.message());
                let entry = RegistryEntry::new(metadata, config, None, PluginState::Error);
                return Err(self.register_failed(entry, failure));
            }
            Err(payload) => {
                let failure = PluginFailure::panicked(Operation::Load, payload);
                let entry = RegistryEntry::new(metadata, config, None, PluginState::Error);
                return Err(self.register_failed(entry, failure));
            }
        };

        let outcome = invoke(instance.as_mut(), Operation::Load, &ctx);
        let handle = Some(Arc::new(Mutex::new(instance)));

        match outcome {
            Ok(()) => {
                self.registry.add(RegistryEntry::new(
                    metadata,
                    config,
                    handle,
                    PluginState::Loaded,
                ))?;
                info!(plugin = %name, version = %version, "Plugin loaded");
                Ok(())
            }
            Err(failure) => {
                let entry = RegistryEntry::new(metadata, config, handle, PluginState::Error);
                Err(self.register_failed(entry, failure))
            }
        }
    }

    fn register_failed(&self, entry: RegistryEntry, failure: PluginFailure) -> TetherError {
        let plugin = entry.name().to_string();
        log_failure(&plugin, &failure);

        if let Err(e) = self.registry.add(entry.with_error(failure.clone())) {
            return e;
        }
        TetherError::Hook { plugin, failure }
    }

    fn enable_locked(&self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;

        match entry.state {
            PluginState::Enabled => {
                debug!(plugin = %name, "Plugin already enabled");
                return Ok(());
            }
            PluginState::Loaded | PluginState::Disabled => {}
            state => {
                return Err(TetherError::InvalidTransition {
                    plugin: name.to_string(),
                    operation: Operation::Enable,
                    state,
                });
            }
        }

        for dep in entry.metadata.unique_dependencies() {
            let state = self.registry.state(dep);
            if state != Some(PluginState::Enabled) {
                return Err(TetherError::DependencyNotReady {
                    plugin: name.to_string(),
                    operation: Operation::Enable,
                    dependency: dep.to_string(),
                    state,
                });
            }
        }

        self.run_hook(&entry, Operation::Enable)?;
        self.registry.set_state(name, PluginState::Enabled)?;
        info!(plugin = %name, "Plugin enabled");
        Ok(())
    }

    fn disable_locked(&self, name: &str) -> Result<()> {
        let entry = self.entry(name)?;

        match entry.state {
            PluginState::Enabled => {}
            PluginState::Loaded | PluginState::Disabled => {
                debug!(plugin = %name, state = %entry.state, "Plugin not enabled");
                return Ok(());
            }
            state => {
                return Err(TetherError::InvalidTransition {
                    plugin: name.to_string(),
                    operation: Operation::Disable,
                    state,
                });
            }
        }

        self.ensure_unused(name, Operation::Disable)?;
        self.run_hook(&entry, Operation::Disable)?;
        self.registry.set_state(name, PluginState::Disabled)?;
        info!(plugin = %name, "Plugin disabled");
        Ok(())
    }

    /// With `force`, the in-use check is skipped and the entry is removed
    /// even if `on_unload` fails.
    fn unload_locked(&self, name: &str, force: bool) -> Result<()> {
        let mut entry = self.entry(name)?;

        if !force {
            self.ensure_unused(name, Operation::Unload)?;
        }

        if entry.state == PluginState::Enabled {
            if let Err(e) = self.disable_locked(name) {
                if !force {
                    return Err(e);
                }
            }
            entry = self.entry(name)?;
        }

        if !entry.state.allows(Operation::Unload) {
            return Err(TetherError::InvalidTransition {
                plugin: name.to_string(),
                operation: Operation::Unload,
                state: entry.state,
            });
        }

        let outcome = match entry.instance {
            Some(_) => self.run_hook(&entry, Operation::Unload),
            None => Ok(()),
        };

        if outcome.is_ok() || force {
            self.registry.remove(name);
            self.pending_configs
                .lock()
                .insert(name.to_string(), (*entry.config).clone());
            info!(plugin = %name, "Plugin unloaded");
        }
        outcome
    }

    fn ensure_unused(&self, name: &str, operation: Operation) -> Result<()> {
        let dependents = self.registry.enabled_dependents(name);
        if dependents.is_empty() {
            Ok(())
        } else {
            Err(TetherError::PluginInUse {
                plugin: name.to_string(),
                operation,
                dependents,
            })
        }
    }

    /// Runs a hook on the entry's instance. On failure the plugin moves to
    /// `Error` with the failure recorded.
    fn run_hook(&self, entry: &RegistryEntry, operation: Operation) -> Result<()> {
        let name = entry.name();
        let Some(handle) = &entry.instance else {
            return Err(TetherError::InvalidTransition {
                plugin: name.to_string(),
                operation,
                state: entry.state,
            });
        };

        let ctx = entry.context();
        let outcome = {
            let mut plugin = handle.lock();
            invoke(&mut **plugin, operation, &ctx)
        };

        outcome.map_err(|failure| {
            log_failure(name, &failure);
            if let Err(e) = self.registry.record_failure(name, failure.clone()) {
                return e;
            }
            TetherError::Hook {
                plugin: name.to_string(),
                failure,
            }
        })
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if self.registry.is_empty() {
            return;
        }

        let report = self.shutdown();
        if !report.failures.is_empty() {
            warn!(
                failures = report.failures.len(),
                "Plugin manager dropped with failing plugins"
            );
        }
    }
}

/// Calls the hook for `operation`, turning errors and panics into a failure.
fn invoke(
    plugin: &mut dyn Plugin,
    operation: Operation,
    ctx: &PluginContext,
) -> std::result::Result<(), PluginFailure> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| match operation {
        Operation::Load => plugin.on_load(ctx),
        Operation::Enable => plugin.on_enable(ctx),
        Operation::Disable => plugin.on_disable(ctx),
        Operation::Unload => plugin.on_unload(ctx),
        Operation::Configure => plugin.on_config_change(ctx),
    }));

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PluginFailure::returned(operation, e.message())),
        Err(payload) => Err(PluginFailure::panicked(operation, payload)),
    }
}

/// Orders registered plugins so that dependents come before their
/// dependencies. Dependencies that are no longer registered are ignored.
fn teardown_order<'a>(entries: impl Iterator<Item = &'a RegistryEntry>) -> Vec<String> {
    let mut plugins = Vec::new();
    let mut configs = HashMap::new();
    let mut external = HashSet::new();

    for entry in entries {
        plugins.push((*entry.metadata).clone());
        configs.insert(entry.metadata.name.clone(), (*entry.config).clone());
        external.extend(entry.metadata.dependencies.iter().cloned());
    }

    match DependencyResolver::new()
        .with_available(external)
        .teardown_order(&plugins, &configs)
    {
        Ok(order) => order,
        Err(e) => {
            warn!(error = %e, "Could not order plugins for shutdown, using reverse name order");
            let mut names: Vec<String> = plugins.into_iter().map(|m| m.name).collect();
            names.sort();
            names.reverse();
            names
        }
    }
}

fn log_failure(plugin: &str, failure: &PluginFailure) {
    error!(
        plugin = %plugin,
        hook = failure.operation.hook_name(),
        panicked = failure.panicked,
        error = %failure.message,
        "Plugin hook failed"
    );
}

fn log_rejection(operation: Operation, plugin: &str, err: &TetherError) {
    if err.failure().is_none() {
        warn!(plugin = %plugin, operation = %operation, error = %err, "Plugin operation rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;
    use std::thread;

    use tether_core::{ErrorCategory, HookError, HookPlugin};

    type Hook = Box<dyn FnMut(&PluginContext) -> tether_core::HookResult + Send>;

    /// Records every hook call as "name:hook" and fails the configured ones.
    #[derive(Clone, Default)]
    struct Harness {
        calls: Arc<Mutex<Vec<String>>>,
        failing: Arc<Mutex<HashSet<(String, Operation)>>>,
    }

    impl Harness {
        fn fail(&self, name: &str, operation: Operation) {
            self.failing.lock().insert((name.to_string(), operation));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls.lock().iter().filter(|c| *c == call).count()
        }

        fn hook(&self, operation: Operation) -> Hook {
            let harness = self.clone();
            Box::new(move |ctx| {
                let name = ctx.name().to_string();
                harness
                    .calls
                    .lock()
                    .push(format!("{}:{}", name, operation.hook_name()));
                if harness.failing.lock().contains(&(name, operation)) {
                    Err(HookError::new("boom"))
                } else {
                    Ok(())
                }
            })
        }

        fn factories(&self) -> PluginFactories {
            let harness = self.clone();
            PluginFactories::new().with_fallback(move |_ctx| {
                let plugin = HookPlugin::new()
                    .with_load(harness.hook(Operation::Load))
                    .with_enable(harness.hook(Operation::Enable))
                    .with_disable(harness.hook(Operation::Disable))
                    .with_unload(harness.hook(Operation::Unload))
                    .with_config_change(harness.hook(Operation::Configure));
                Ok(Box::new(plugin) as Box<dyn Plugin>)
            })
        }

        fn manager(&self) -> PluginManager {
            PluginManager::new(self.factories())
        }
    }

    fn meta(name: &str, deps: &[&str]) -> PluginMetadata {
        PluginMetadata::new(name, "1.0.0").with_dependencies(deps.iter().copied())
    }

    fn load(manager: &PluginManager, plugins: Vec<PluginMetadata>) -> LoadReport {
        manager.load_all(plugins, HashMap::new()).unwrap()
    }

    #[test]
    fn test_load_all_in_dependency_order() {
        let harness = Harness::default();
        let manager = harness.manager();

        let report = load(
            &manager,
            vec![meta("C", &["A"]), meta("B", &["A"]), meta("A", &[])],
        );

        assert_eq!(report.order, vec!["A", "B", "C"]);
        assert_eq!(report.loaded, vec!["A", "B", "C"]);
        assert!(report.is_success());
        assert_eq!(harness.calls(), vec!["A:on_load", "B:on_load", "C:on_load"]);
        for name in ["A", "B", "C"] {
            assert_eq!(manager.state(name), Some(PluginState::Loaded));
        }
    }

    #[test]
    fn test_resolution_error_aborts_batch() {
        let harness = Harness::default();
        let manager = harness.manager();

        let err = manager
            .load_all(vec![meta("A", &["B"]), meta("B", &["A"])], HashMap::new())
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Resolution);
        assert!(manager.registry().is_empty());
        assert!(harness.calls().is_empty());

        let err = manager
            .load_all(vec![meta("A", &[]), meta("B", &["ghost"])], HashMap::new())
            .unwrap_err();
        assert!(matches!(err, TetherError::MissingDependency { .. }));
        assert!(manager.registry().is_empty());
    }

    #[test]
    fn test_enable_before_dependency_fails() {
        let harness = Harness::default();
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[]), meta("B", &["A"])]);

        let err = manager.enable("B").unwrap_err();
        assert!(matches!(
            err,
            TetherError::DependencyNotReady { ref dependency, state: Some(PluginState::Loaded), .. }
                if dependency == "A"
        ));
        assert_eq!(manager.state("B"), Some(PluginState::Loaded));
        assert_eq!(harness.count("B:on_enable"), 0);

        manager.enable("A").unwrap();
        manager.enable("B").unwrap();
        assert_eq!(manager.enabled(), vec!["A", "B"]);
    }

    #[test]
    fn test_disable_in_use_fails() {
        let harness = Harness::default();
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[]), meta("B", &["A"])]);
        manager.enable("A").unwrap();
        manager.enable("B").unwrap();

        let err = manager.disable("A").unwrap_err();
        assert_eq!(
            err,
            TetherError::PluginInUse {
                plugin: "A".into(),
                operation: Operation::Disable,
                dependents: vec!["B".into()],
            }
        );
        assert_eq!(manager.state("A"), Some(PluginState::Enabled));
        assert_eq!(harness.count("A:on_disable"), 0);

        let err = manager.unload("A").unwrap_err();
        assert!(matches!(err, TetherError::PluginInUse { .. }));

        manager.disable("B").unwrap();
        manager.disable("A").unwrap();
        assert_eq!(manager.state("A"), Some(PluginState::Disabled));
    }

    #[test]
    fn test_load_failure_is_captured() {
        let harness = Harness::default();
        harness.fail("A", Operation::Load);
        let manager = harness.manager();

        let report = load(&manager, vec![meta("A", &[])]);

        assert!(report.loaded.is_empty());
        let err = report.error_for("A").unwrap();
        assert_eq!(err.category(), ErrorCategory::Hook);
        assert!(err.to_string().contains("boom"));
        assert_eq!(manager.state("A"), Some(PluginState::Error));

        let failure = manager.get_error("A").unwrap();
        assert_eq!(failure.operation, Operation::Load);
        assert_eq!(failure.message, "boom");
        assert!(!failure.panicked);
    }

    #[test]
    fn test_failure_isolation_in_batch() {
        let harness = Harness::default();
        harness.fail("B", Operation::Load);
        let manager = harness.manager();

        let report = load(&manager, vec![meta("A", &[]), meta("B", &[]), meta("C", &[])]);

        assert_eq!(report.loaded, vec!["A", "C"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(manager.state("A"), Some(PluginState::Loaded));
        assert_eq!(manager.state("B"), Some(PluginState::Error));
        assert_eq!(manager.state("C"), Some(PluginState::Loaded));
    }

    #[test]
    fn test_dependent_of_failed_plugin_is_not_loaded() {
        let harness = Harness::default();
        harness.fail("A", Operation::Load);
        let manager = harness.manager();

        let report = load(&manager, vec![meta("A", &[]), meta("B", &["A"])]);

        assert!(matches!(
            report.error_for("B"),
            Some(TetherError::DependencyNotReady { state: Some(PluginState::Error), .. })
        ));
        assert_eq!(manager.state("B"), None);
        assert_eq!(harness.count("B:on_load"), 0);
    }

    #[test]
    fn test_panicking_hook_is_captured() {
        let factories = PluginFactories::new().with("bad", |_ctx| {
            let plugin = HookPlugin::new().with_enable(|_| panic!("kaboom"));
            Ok(Box::new(plugin) as Box<dyn Plugin>)
        });
        let manager = PluginManager::new(factories);
        load(&manager, vec![meta("bad", &[])]);

        let err = manager.enable("bad").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Hook);

        let failure = manager.get_error("bad").unwrap();
        assert!(failure.panicked);
        assert_eq!(failure.message, "kaboom");
        assert_eq!(manager.state("bad"), Some(PluginState::Error));
    }

    #[test]
    fn test_factory_errors() {
        let factories = PluginFactories::new()
            .with("broken", |_ctx| Err(HookError::new("no connection")));
        let manager = PluginManager::new(factories);

        let report = load(&manager, vec![meta("broken", &[]), meta("unknown", &[])]);

        assert_eq!(manager.state("broken"), Some(PluginState::Error));
        assert_eq!(manager.get_error("broken").unwrap().message, "no connection");
        assert_eq!(
            report.error_for("unknown"),
            Some(&TetherError::FactoryNotFound("unknown".into()))
        );
        assert_eq!(manager.state("unknown"), None);

        // A plugin without an instance can still be cleaned up.
        manager.unload("broken").unwrap();
        assert_eq!(manager.state("broken"), None);
    }

    #[test]
    fn test_error_state_allows_only_unload() {
        let harness = Harness::default();
        harness.fail("A", Operation::Enable);
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[])]);

        assert!(manager.enable("A").is_err());
        assert_eq!(manager.state("A"), Some(PluginState::Error));

        assert!(matches!(
            manager.enable("A"),
            Err(TetherError::InvalidTransition { state: PluginState::Error, .. })
        ));
        assert!(matches!(
            manager.disable("A"),
            Err(TetherError::InvalidTransition { .. })
        ));

        manager.unload("A").unwrap();
        assert_eq!(harness.count("A:on_unload"), 1);
        assert_eq!(manager.state("A"), None);
    }

    #[test]
    fn test_unload_failure_keeps_entry_in_error() {
        let harness = Harness::default();
        harness.fail("A", Operation::Unload);
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[])]);

        assert!(manager.unload("A").is_err());
        assert_eq!(manager.state("A"), Some(PluginState::Error));
        assert_eq!(manager.get_error("A").unwrap().operation, Operation::Unload);
    }

    #[test]
    fn test_unknown_plugin_not_found() {
        let harness = Harness::default();
        let manager = harness.manager();

        for result in [
            manager.enable("ghost"),
            manager.disable("ghost"),
            manager.unload("ghost"),
        ] {
            assert_eq!(result, Err(TetherError::NotFound("ghost".into())));
        }
        assert!(harness.calls().is_empty());
        assert!(manager.info("ghost").is_none());
        assert!(manager.get_error("ghost").is_none());
    }

    #[test]
    fn test_idempotent_enable_and_disable() {
        let harness = Harness::default();
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[])]);

        manager.disable("A").unwrap();
        assert_eq!(manager.state("A"), Some(PluginState::Loaded));

        manager.enable("A").unwrap();
        manager.enable("A").unwrap();
        assert_eq!(harness.count("A:on_enable"), 1);

        manager.disable("A").unwrap();
        manager.disable("A").unwrap();
        assert_eq!(harness.count("A:on_disable"), 1);

        manager.enable("A").unwrap();
        assert_eq!(harness.count("A:on_enable"), 2);
    }

    #[test]
    fn test_unload_enabled_plugin_disables_first() {
        let harness = Harness::default();
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[])]);
        manager.enable("A").unwrap();

        manager.unload("A").unwrap();
        assert_eq!(
            harness.calls(),
            vec!["A:on_load", "A:on_enable", "A:on_disable", "A:on_unload"]
        );
        assert_eq!(manager.state("A"), None);
        assert_eq!(manager.enable("A"), Err(TetherError::NotFound("A".into())));
    }

    #[test]
    fn test_configure_live_plugin() {
        let harness = Harness::default();
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[])]);
        manager.enable("A").unwrap();

        let config = PluginConfig::default()
            .with_priority(3)
            .with_setting("endpoint", "https://example.test");
        manager.configure("A", config.clone()).unwrap();

        assert_eq!(harness.count("A:on_config_change"), 1);
        assert_eq!(manager.state("A"), Some(PluginState::Enabled));
        let entry = manager.registry().get("A").unwrap();
        assert_eq!(*entry.config, config);
    }

    #[test]
    fn test_configure_hook_receives_new_config() {
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        let factories = PluginFactories::new().with("A", move |_ctx| {
            let sink = sink.clone();
            let plugin = HookPlugin::new().with_config_change(move |ctx| {
                *sink.lock() = ctx.config().setting("level").cloned();
                Ok(())
            });
            Ok(Box::new(plugin) as Box<dyn Plugin>)
        });
        let manager = PluginManager::new(factories);
        load(&manager, vec![meta("A", &[])]);

        manager
            .configure("A", PluginConfig::default().with_setting("level", "debug"))
            .unwrap();
        assert_eq!(*seen.lock(), Some(serde_json::json!("debug")));
    }

    #[test]
    fn test_configure_failure_moves_to_error() {
        let harness = Harness::default();
        harness.fail("A", Operation::Configure);
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[])]);

        let err = manager.configure("A", PluginConfig::default()).unwrap_err();
        assert_eq!(err.failure().unwrap().operation, Operation::Configure);
        assert_eq!(manager.state("A"), Some(PluginState::Error));
    }

    #[test]
    fn test_configure_unloaded_plugin_is_deferred() {
        let harness = Harness::default();
        let manager = harness.manager();

        let config = PluginConfig::default().with_priority(7);
        manager.configure("A", config.clone()).unwrap();
        assert!(harness.calls().is_empty());
        assert_eq!(manager.pending_config("A"), Some(config));

        load(&manager, vec![meta("A", &[])]);
        assert_eq!(manager.info("A").unwrap().priority, 7);
        assert_eq!(manager.pending_config("A"), None);
        assert_eq!(harness.count("A:on_config_change"), 0);
    }

    #[test]
    fn test_unload_keeps_config_for_reload() {
        let harness = Harness::default();
        let manager = harness.manager();
        let mut configs = HashMap::new();
        configs.insert("A".to_string(), PluginConfig::default().with_priority(9));
        manager.load_all(vec![meta("A", &[])], configs).unwrap();

        manager.unload("A").unwrap();
        manager.load(meta("A", &[]), None).unwrap();
        assert_eq!(manager.info("A").unwrap().priority, 9);
    }

    #[test]
    fn test_auto_enable_from_config() {
        let harness = Harness::default();
        let manager = harness.manager();

        let mut configs = HashMap::new();
        configs.insert("A".to_string(), PluginConfig::default().with_enabled(true));
        configs.insert("B".to_string(), PluginConfig::default().with_enabled(true));
        let report = manager
            .load_all(vec![meta("B", &["A"]), meta("A", &[]), meta("C", &[])], configs)
            .unwrap();

        assert_eq!(report.enabled, vec!["A", "B"]);
        assert_eq!(manager.state("C"), Some(PluginState::Loaded));
    }

    #[test]
    fn test_auto_enable_reports_unready_dependency() {
        let harness = Harness::default();
        let manager = harness.manager();

        let mut configs = HashMap::new();
        configs.insert("B".to_string(), PluginConfig::default().with_enabled(true));
        let report = manager
            .load_all(vec![meta("A", &[]), meta("B", &["A"])], configs)
            .unwrap();

        assert!(report.enabled.is_empty());
        assert!(matches!(
            report.error_for("B"),
            Some(TetherError::DependencyNotReady { .. })
        ));
        assert_eq!(manager.state("B"), Some(PluginState::Loaded));
    }

    #[test]
    fn test_auto_enable_can_be_turned_off() {
        let harness = Harness::default();
        let manager = harness.manager().with_auto_enable(false);

        let mut configs = HashMap::new();
        configs.insert("A".to_string(), PluginConfig::default().with_enabled(true));
        let report = manager.load_all(vec![meta("A", &[])], configs).unwrap();

        assert!(report.enabled.is_empty());
        assert_eq!(manager.state("A"), Some(PluginState::Loaded));
    }

    #[test]
    fn test_later_batch_depends_on_loaded_plugins() {
        let harness = Harness::default();
        let manager = harness.manager();
        load(&manager, vec![meta("db", &[])]);

        let report = load(&manager, vec![meta("web", &["db"])]);
        assert_eq!(report.loaded, vec!["web"]);

        let report = load(&manager, vec![meta("db", &[])]);
        assert_eq!(
            report.error_for("db"),
            Some(&TetherError::AlreadyLoaded("db".into()))
        );
    }

    #[test]
    fn test_single_load_requires_dependencies() {
        let harness = Harness::default();
        let manager = harness.manager();

        let err = manager.load(meta("web", &["db"]), None).unwrap_err();
        assert!(matches!(
            err,
            TetherError::DependencyNotReady { operation: Operation::Load, state: None, .. }
        ));

        manager.load(meta("db", &[]), None).unwrap();
        manager.load(meta("web", &["db"]), None).unwrap();
        assert_eq!(manager.registry().len(), 2);
    }

    #[test]
    fn test_single_load_auto_enables() {
        let harness = Harness::default();
        harness.fail("C", Operation::Enable);
        let manager = harness.manager();
        let enabled = || Some(PluginConfig::default().with_enabled(true));

        manager.load(meta("A", &[]), enabled()).unwrap();
        assert_eq!(manager.state("A"), Some(PluginState::Enabled));

        manager.load(meta("B", &[]), None).unwrap();
        assert_eq!(manager.state("B"), Some(PluginState::Loaded));

        // A failed enable still leaves the plugin registered
        manager.load(meta("C", &[]), enabled()).unwrap();
        assert_eq!(manager.state("C"), Some(PluginState::Error));
        assert_eq!(manager.get_error("C").unwrap().operation, Operation::Enable);

        let manager = harness.manager().with_auto_enable(false);
        manager.load(meta("D", &[]), enabled()).unwrap();
        assert_eq!(manager.state("D"), Some(PluginState::Loaded));
        assert_eq!(harness.count("D:on_enable"), 0);
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let harness = Harness::default();
        let manager = harness.manager();

        let mut configs = HashMap::new();
        configs.insert("zeta".to_string(), PluginConfig::default().with_priority(1));
        manager
            .load_all(
                vec![
                    meta("alpha", &[]).with_tags(["io"]),
                    meta("beta", &[]),
                    meta("zeta", &[]).with_tags(["io"]),
                ],
                configs,
            )
            .unwrap();
        manager.enable("beta").unwrap();

        let names = |infos: Vec<PluginInfo>| infos.into_iter().map(|i| i.name).collect::<Vec<_>>();

        assert_eq!(names(manager.list(&PluginFilter::all())), vec!["zeta", "alpha", "beta"]);
        assert_eq!(
            names(manager.list(&PluginFilter::all().with_tag("io"))),
            vec!["zeta", "alpha"]
        );
        assert_eq!(
            names(manager.list(&PluginFilter::all().with_state(PluginState::Enabled))),
            vec!["beta"]
        );
        assert!(
            manager
                .list(&PluginFilter::all().with_tag("io").with_state(PluginState::Enabled))
                .is_empty()
        );
    }

    #[test]
    fn test_info_reports_error() {
        let harness = Harness::default();
        harness.fail("A", Operation::Load);
        let manager = harness.manager();
        load(
            &manager,
            vec![
                meta("A", &[])
                    .with_author("ops")
                    .with_description("mailer")
                    .with_compatible_versions(["2.x"])
                    .with_config_schema(serde_json::json!({"type": "object"})),
            ],
        );

        let info = manager.info("A").unwrap();
        assert_eq!(info.author, "ops");
        assert_eq!(info.compatible_versions, vec!["2.x"]);
        assert_eq!(info.config_schema, Some(serde_json::json!({"type": "object"})));
        assert_eq!(info.state, PluginState::Error);
        assert_eq!(info.error.unwrap().message, "boom");
    }

    #[test]
    fn test_shutdown_reverse_dependency_order() {
        let harness = Harness::default();
        let manager = harness.manager();
        load(
            &manager,
            vec![meta("A", &[]), meta("B", &["A"]), meta("C", &["B"]), meta("D", &[])],
        );
        for name in ["A", "B", "C"] {
            manager.enable(name).unwrap();
        }

        let report = manager.shutdown();

        assert_eq!(report.disabled, vec!["C", "B", "A"]);
        assert_eq!(report.unloaded, vec!["D", "C", "B", "A"]);
        assert!(report.failures.is_empty());
        assert!(manager.registry().is_empty());

        let unloads: Vec<_> = harness
            .calls()
            .into_iter()
            .filter(|c| c.ends_with("on_unload"))
            .collect();
        assert_eq!(unloads, vec!["D:on_unload", "C:on_unload", "B:on_unload", "A:on_unload"]);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let harness = Harness::default();
        harness.fail("B", Operation::Unload);
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[]), meta("B", &[])]);
        manager.enable("A").unwrap();

        let first = manager.shutdown();
        assert_eq!(first.failures.len(), 1);
        assert!(manager.registry().is_empty());

        let second = manager.shutdown();
        assert!(second.is_noop());
        assert_eq!(harness.count("A:on_unload"), 1);
        assert_eq!(harness.count("B:on_unload"), 1);
    }

    #[test]
    fn test_shutdown_continues_after_disable_failure() {
        let harness = Harness::default();
        harness.fail("B", Operation::Disable);
        let manager = harness.manager();
        load(&manager, vec![meta("A", &[]), meta("B", &["A"])]);
        manager.enable("A").unwrap();
        manager.enable("B").unwrap();

        let report = manager.shutdown();

        assert_eq!(report.disabled, vec!["A"]);
        assert_eq!(report.unloaded, vec!["B", "A"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "B");
        assert!(manager.registry().is_empty());
    }

    #[test]
    fn test_drop_runs_shutdown() {
        let harness = Harness::default();
        {
            let manager = harness.manager();
            load(&manager, vec![meta("A", &[])]);
            manager.enable("A").unwrap();
        }
        assert_eq!(harness.count("A:on_disable"), 1);
        assert_eq!(harness.count("A:on_unload"), 1);
    }

    #[test]
    fn test_observer_sees_transitions() {
        let harness = Harness::default();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = changes.clone();
        let manager = harness
            .manager()
            .with_observer(move |change| sink.lock().push((change.plugin.clone(), change.to)));

        load(&manager, vec![meta("A", &[])]);
        manager.enable("A").unwrap();
        manager.shutdown();

        assert_eq!(
            *changes.lock(),
            vec![
                ("A".to_string(), PluginState::Loaded),
                ("A".to_string(), PluginState::Enabled),
                ("A".to_string(), PluginState::Disabled),
                ("A".to_string(), PluginState::Unloaded),
            ]
        );
    }

    #[test]
    fn test_concurrent_operations() {
        let harness = Harness::default();
        let manager = Arc::new(harness.manager());
        let plugins: Vec<_> = (0..8).map(|i| meta(&format!("p{}", i), &[])).collect();
        load(&manager, plugins);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                thread::spawn(move || {
                    let name = format!("p{}", i);
                    for _ in 0..10 {
                        manager.enable(&name).unwrap();
                        manager.disable(&name).unwrap();
                    }
                    manager.enable(&name).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.enabled().len(), 8);
        assert_eq!(harness.count("p3:on_enable"), 11);
    }

    #[test]
    fn test_hook_can_call_back_into_manager() {
        let harness = Harness::default();
        let slot: Arc<Mutex<Weak<PluginManager>>> = Arc::new(Mutex::new(Weak::new()));

        let hook_slot = slot.clone();
        let factories = harness.factories().with("B", move |_ctx| {
            let slot = hook_slot.clone();
            let plugin = HookPlugin::new().with_enable(move |_ctx| {
                let manager = slot.lock().upgrade().ok_or_else(|| HookError::new("gone"))?;
                manager.enable("A").map_err(|e| HookError::new(e.to_string()))
            });
            Ok(Box::new(plugin) as Box<dyn Plugin>)
        });

        let manager = Arc::new(PluginManager::new(factories));
        *slot.lock() = Arc::downgrade(&manager);
        load(&manager, vec![meta("A", &[]), meta("B", &[])]);

        manager.enable("B").unwrap();
        assert_eq!(manager.state("A"), Some(PluginState::Enabled));
        assert_eq!(manager.state("B"), Some(PluginState::Enabled));
        assert_eq!(harness.count("A:on_enable"), 1);
    }
}
