//! Order command implementation.

use std::path::Path;

use console::style;
use miette::{Result, miette};
use tether_core::DEFAULT_PRIORITY;
use tether_engine::DependencyResolver;

use crate::discovery;

/// Prints the load order and the matching shutdown order.
pub fn execute(dir: &Path) -> Result<()> {
    let (plugins, configs) = discovery::load_plugins(dir)?.into_batch();

    let order = DependencyResolver::new()
        .resolve(&plugins, &configs)
        .map_err(|e| miette!("Failed to resolve load order: {}", e))?;

    println!("{}", style("Load order:").bold());
    for (i, name) in order.iter().enumerate() {
        let priority = configs
            .get(name)
            .map(|c| c.priority)
            .unwrap_or(DEFAULT_PRIORITY);
        println!(
            "  {:>3}. {} {}",
            i + 1,
            name,
            style(format!("(priority {})", priority)).dim()
        );
    }

    let teardown: Vec<&str> = order.iter().rev().map(String::as_str).collect();
    println!();
    println!("{} {}", style("Shutdown order:").bold(), teardown.join(" → "));

    Ok(())
}
