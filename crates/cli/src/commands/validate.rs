//! Validate command implementation.

use std::path::Path;

use miette::{Result, miette};
use tether_engine::DependencyResolver;

use crate::output;

/// Validates every manifest in the plugin directory and the dependency
/// graph they form.
pub fn execute(dir: &Path) -> Result<()> {
    output::info(&format!("Validating {}...", dir.display()));

    if !dir.is_dir() {
        return Err(miette!("Plugin directory not found: {}", dir.display()));
    }

    let discovery = tether_plugin::discover(dir);

    // Report every broken manifest, not just the first one
    for err in &discovery.errors {
        output::error(&err.to_string());
    }
    if !discovery.is_clean() {
        return Err(miette!(
            "Validation failed: {} invalid manifest(s)",
            discovery.errors.len()
        ));
    }

    let count = discovery.manifests.len();
    let (plugins, configs) = discovery.into_batch();

    match DependencyResolver::new().resolve(&plugins, &configs) {
        Ok(_) => {}
        Err(e) => {
            output::error(&format!("Dependency error: {}", e));
            return Err(miette!("Validation failed: {}", e));
        }
    }

    output::success(&format!("Plugin set is valid ({} plugins)", count));

    Ok(())
}
