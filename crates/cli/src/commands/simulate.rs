//! Simulate command implementation.
//!
//! Drives a real `PluginManager` over the discovered plugin set, with a
//! stand-in plugin behind every manifest that only logs its hooks.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use console::style;
use miette::{Result, miette};
use tether_core::{HookError, HookPlugin, Operation, Plugin, PluginContext, PluginFactories};
use tether_engine::{PluginFilter, PluginManager};
use tracing::info;

use crate::discovery;
use crate::output;

/// Hooks that should fail, by plugin name.
#[derive(Debug, Clone, Default, PartialEq)]
struct FailurePlan {
    hooks: HashSet<(String, Operation)>,
}

impl FailurePlan {
    /// Parses `NAME` or `NAME:HOOK` specs. A bare name fails `on_load`.
    fn parse(specs: &[String]) -> Result<Self> {
        let mut hooks = HashSet::new();

        for spec in specs {
            let (name, hook) = match spec.split_once(':') {
                Some((name, hook)) => (name, hook),
                None => (spec.as_str(), "load"),
            };

            let operation = match hook.trim_start_matches("on_") {
                "load" => Operation::Load,
                "enable" => Operation::Enable,
                "disable" => Operation::Disable,
                "unload" => Operation::Unload,
                "config_change" | "configure" => Operation::Configure,
                other => return Err(miette!("Unknown hook '{}' in --fail {}", other, spec)),
            };

            if name.is_empty() {
                return Err(miette!("Missing plugin name in --fail {}", spec));
            }
            hooks.insert((name.to_string(), operation));
        }

        Ok(Self { hooks })
    }

    fn fails(&self, plugin: &str, operation: Operation) -> bool {
        self.hooks.contains(&(plugin.to_string(), operation))
    }
}

/// Builds a hook that logs the call and fails when the plan says so.
fn stand_in_hook(
    plan: Arc<FailurePlan>,
    operation: Operation,
) -> impl FnMut(&PluginContext) -> tether_core::HookResult + Send + 'static {
    move |ctx| {
        info!(plugin = %ctx.name(), hook = operation.hook_name(), "Simulated hook");
        if plan.fails(ctx.name(), operation) {
            Err(HookError::new(format!("simulated {} failure", operation)))
        } else {
            Ok(())
        }
    }
}

fn stand_in_factories(plan: FailurePlan) -> PluginFactories {
    let plan = Arc::new(plan);
    PluginFactories::new().with_fallback(move |_ctx| {
        let plugin = HookPlugin::new()
            .with_load(stand_in_hook(plan.clone(), Operation::Load))
            .with_enable(stand_in_hook(plan.clone(), Operation::Enable))
            .with_disable(stand_in_hook(plan.clone(), Operation::Disable))
            .with_unload(stand_in_hook(plan.clone(), Operation::Unload))
            .with_config_change(stand_in_hook(plan.clone(), Operation::Configure));
        Ok(Box::new(plugin) as Box<dyn Plugin>)
    })
}

/// Loads, enables and shuts down the discovered plugins.
pub fn execute(dir: &Path, fail: &[String], enable_all: bool) -> Result<()> {
    let plan = FailurePlan::parse(fail)?;
    let (plugins, configs) = discovery::load_plugins(dir)?.into_batch();

    let manager = PluginManager::new(stand_in_factories(plan))
        .with_observer(|change| output::transition(&change.plugin, change.from, change.to));

    output::section_header("Load");
    let report = manager
        .load_all(plugins, configs)
        .map_err(|e| miette!("Failed to resolve plugins: {}", e))?;

    if enable_all {
        for name in &report.loaded {
            if manager.state(name) == Some(tether_core::PluginState::Loaded) {
                if let Err(e) = manager.enable(name) {
                    output::warning(&format!("Cannot enable {}: {}", name, e));
                }
            }
        }
    }

    for (name, err) in report.failed.iter().chain(&report.activation_failed) {
        output::error(&format!("{}: {}", name, err));
    }

    output::section_header("State");
    for info in manager.list(&PluginFilter::all()) {
        print!(
            "  {:<24} {:<10} {}",
            info.name,
            output::state_label(info.state),
            style(format!("priority {}", info.priority)).dim()
        );
        if let Some(failure) = &info.error {
            print!("  {}", style(failure).red());
        }
        println!();
    }

    output::section_header("Shutdown");
    let shutdown = manager.shutdown();
    for (name, err) in &shutdown.failures {
        output::error(&format!("{}: {}", name, err));
    }

    let failures = report.failed.len() + report.activation_failed.len() + shutdown.failures.len();
    output::summary(
        failures == 0,
        &format!(
            "{} loaded, {} unloaded, {} failure(s)",
            report.loaded.len(),
            shutdown.unloaded.len(),
            failures
        ),
    );

    Ok(())
}
