//! Init command implementation.

use std::path::{Path, PathBuf};

use miette::{Result, miette};
use tether_plugin::{ManifestFormat, PluginManifest};

use crate::output;

/// Writes a plugin manifest template in the current directory.
pub fn execute(name: Option<&str>, format: ManifestFormat, force: bool) -> Result<()> {
    let cwd =
        std::env::current_dir().map_err(|e| miette!("Cannot get current directory: {}", e))?;

    let path = write_template(&cwd, name, format, force)?;

    output::success(&format!("Created {}", path.display()));
    output::info("Run 'tether validate' to check the plugin set");

    Ok(())
}

/// Writes the template into `dir`. Refuses to overwrite any existing
/// manifest unless `force` is set.
fn write_template(
    dir: &Path,
    name: Option<&str>,
    format: ManifestFormat,
    force: bool,
) -> Result<PathBuf> {
    if !force {
        let existing = ManifestFormat::ALL
            .iter()
            .map(|f| dir.join(f.file_name()))
            .chain(std::iter::once(dir.join("plugin.yml")))
            .find(|p| p.exists());

        if let Some(existing) = existing {
            return Err(miette!(
                "{} already exists. Use --force to overwrite.",
                existing.display()
            ));
        }
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("my-plugin")
            .to_string(),
    };

    PluginManifest::template(name)
        .write_to(dir, format)
        .map_err(|e| miette!("Failed to write manifest: {}", e))
}
