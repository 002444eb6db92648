//! Tether Engine - Dependency resolution and lifecycle management for Tether plugins.

mod graph;
mod manager;
mod registry;
mod report;
mod resolver;

pub use graph::DependencyGraph;
pub use manager::PluginManager;
pub use registry::{PluginHandle, PluginRegistry, RegistryEntry, StateChange, StateObserver};
pub use report::{LoadReport, PluginFilter, PluginInfo, ShutdownReport};
pub use resolver::DependencyResolver;
