//! The plugin capability interface.

use std::sync::Arc;

use crate::config::PluginConfig;
use crate::failure::HookResult;
use crate::metadata::PluginMetadata;

/// Read-only view of a plugin's metadata and current configuration,
/// handed to every hook.
#[derive(Debug, Clone)]
pub struct PluginContext {
    metadata: Arc<PluginMetadata>,
    config: Arc<PluginConfig>,
}

impl PluginContext {
    /// Creates a new context.
    pub fn new(metadata: Arc<PluginMetadata>, config: Arc<PluginConfig>) -> Self {
        Self { metadata, config }
    }

    /// Returns the plugin's metadata.
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Returns the plugin's configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Returns the plugin name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Lifecycle contract implemented by every plugin.
///
/// Hooks are side-effecting callbacks. They report failure by returning an
/// error; the manager owns the plugin's state and records the failure.
///
/// A hook may call back into the manager to act on other plugins, but not
/// on its own plugin: the instance stays locked until the hook returns.
pub trait Plugin: Send {
    /// Called once after the plugin is constructed.
    fn on_load(&mut self, ctx: &PluginContext) -> HookResult;

    /// Called before the plugin is dropped.
    fn on_unload(&mut self, ctx: &PluginContext) -> HookResult;

    /// Called when the plugin starts providing its functionality.
    fn on_enable(&mut self, ctx: &PluginContext) -> HookResult;

    /// Called when the plugin stops providing its functionality.
    fn on_disable(&mut self, ctx: &PluginContext) -> HookResult;

    /// Called after the manager replaced the plugin's configuration.
    /// `ctx.config()` is the new configuration.
    fn on_config_change(&mut self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }
}

type HookFn = Box<dyn FnMut(&PluginContext) -> HookResult + Send>;

/// A plugin assembled from closures.
///
/// Hooks that are not set succeed without doing anything.
#[derive(Default)]
pub struct HookPlugin {
    load: Option<HookFn>,
    unload: Option<HookFn>,
    enable: Option<HookFn>,
    disable: Option<HookFn>,
    config_change: Option<HookFn>,
}

impl HookPlugin {
    /// Creates a plugin whose hooks all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `on_load` hook.
    pub fn with_load(mut self, f: impl FnMut(&PluginContext) -> HookResult + Send + 'static) -> Self {
        self.load = Some(Box::new(f));
        self
    }

    /// Sets the `on_unload` hook.
    pub fn with_unload(
        mut self,
        f: impl FnMut(&PluginContext) -> HookResult + Send + 'static,
    ) -> Self {
        self.unload = Some(Box::new(f));
        self
    }

    /// Sets the `on_enable` hook.
    pub fn with_enable(
        mut self,
        f: impl FnMut(&PluginContext) -> HookResult + Send + 'static,
    ) -> Self {
        self.enable = Some(Box::new(f));
        self
    }

    /// Sets the `on_disable` hook.
    pub fn with_disable(
        mut self,
        f: impl FnMut(&PluginContext) -> HookResult + Send + 'static,
    ) -> Self {
        self.disable = Some(Box::new(f));
        self
    }

    /// Sets the `on_config_change` hook.
    pub fn with_config_change(
        mut self,
        f: impl FnMut(&PluginContext) -> HookResult + Send + 'static,
    ) -> Self {
        self.config_change = Some(Box::new(f));
        self
    }
}

fn call(hook: &mut Option<HookFn>, ctx: &PluginContext) -> HookResult {
    match hook {
        Some(f) => f(ctx),
        None => Ok(()),
    }
}

impl Plugin for HookPlugin {
    fn on_load(&mut self, ctx: &PluginContext) -> HookResult {
        call(&mut self.load, ctx)
    }

    fn on_unload(&mut self, ctx: &PluginContext) -> HookResult {
        call(&mut self.unload, ctx)
    }

    fn on_enable(&mut self, ctx: &PluginContext) -> HookResult {
        call(&mut self.enable, ctx)
    }

    fn on_disable(&mut self, ctx: &PluginContext) -> HookResult {
        call(&mut self.disable, ctx)
    }

    fn on_config_change(&mut self, ctx: &PluginContext) -> HookResult {
        call(&mut self.config_change, ctx)
    }
}
