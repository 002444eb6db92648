//! Load-order resolution for plugin batches.

use std::collections::{HashMap, HashSet};

use tether_core::{DEFAULT_PRIORITY, PluginConfig, PluginMetadata, Result};
use tracing::debug;

use crate::graph::DependencyGraph;

/// Computes a dependency-respecting load order for a batch of plugins.
///
/// The result depends only on the input: the same metadata and
/// priorities always yield the same order.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    /// Names outside the batch that count as already satisfied.
    available: HashSet<String>,
}

impl DependencyResolver {
    /// Creates a resolver with no pre-satisfied dependencies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats the given names as already loaded.
    pub fn with_available<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.available.extend(names.into_iter().map(Into::into));
        self
    }

    /// Builds the dependency graph for a batch, validating every edge.
    pub fn graph(&self, plugins: &[PluginMetadata]) -> Result<DependencyGraph> {
        DependencyGraph::build(plugins, &self.available)
    }

    /// Returns plugin names in load order.
    ///
    /// Fails with a missing-dependency error before looking for cycles,
    /// and with a circular-dependency error naming the cycle if no order
    /// exists. Priorities come from `configs`; plugins without a config
    /// use the default priority.
    pub fn resolve(
        &self,
        plugins: &[PluginMetadata],
        configs: &HashMap<String, PluginConfig>,
    ) -> Result<Vec<String>> {
        let graph = self.graph(plugins)?;
        let order = graph.load_order(|name| {
            configs
                .get(name)
                .map(|c| c.priority)
                .unwrap_or(DEFAULT_PRIORITY)
        })?;

        debug!(order = ?order, "Resolved plugin load order");
        Ok(order)
    }

    /// Returns plugin names in teardown order: dependents before their
    /// dependencies.
    pub fn teardown_order(
        &self,
        plugins: &[PluginMetadata],
        configs: &HashMap<String, PluginConfig>,
    ) -> Result<Vec<String>> {
        let mut order = self.resolve(plugins, configs)?;
        order.reverse();
        Ok(order)
    }
}
