//! List command implementation.

use std::path::Path;

use console::style;
use miette::{IntoDiagnostic, Result};
use tether_plugin::DiscoveredManifest;

use crate::discovery;
use crate::output;

/// Lists the plugins found in the plugin directory.
pub fn execute(dir: &Path, tag: Option<&str>, detailed: bool, json: bool) -> Result<()> {
    let discovery = discovery::load_plugins(dir)?;

    let mut plugins: Vec<&DiscoveredManifest> = discovery
        .manifests
        .iter()
        .filter(|m| tag.is_none_or(|t| m.manifest.plugin.has_tag(t)))
        .collect();
    plugins.sort_by(|a, b| a.manifest.name().cmp(b.manifest.name()));

    if json {
        let metadata: Vec<_> = plugins.iter().map(|m| &m.manifest.plugin).collect();
        println!("{}", serde_json::to_string_pretty(&metadata).into_diagnostic()?);
        return Ok(());
    }

    if plugins.is_empty() {
        output::info(&format!("No plugins found in {}", dir.display()));
        return Ok(());
    }

    println!("{}", style("Available plugins:").bold());
    println!();

    for found in plugins {
        let plugin = &found.manifest.plugin;
        let config = found.manifest.config.clone().unwrap_or_default();

        if detailed {
            print!("  {} {}", style(&plugin.name).cyan().bold(), style(&plugin.version).dim());
            if config.enabled {
                print!(" {}", style("(enabled)").green());
            }
            println!();

            if !plugin.description.is_empty() {
                println!("    {}", style(&plugin.description).dim());
            }
            if !plugin.author.is_empty() {
                output::key_value("Author", &plugin.author);
            }
            if !plugin.dependencies.is_empty() {
                output::key_value("Dependencies", &plugin.dependencies.join(", "));
            }
            if !plugin.tags.is_empty() {
                output::key_value("Tags", &plugin.tags.join(", "));
            }
            if let Some(entry_point) = &plugin.entry_point {
                output::key_value("Entry point", entry_point);
            }
            if !plugin.compatible_versions.is_empty() {
                output::key_value("Compatible with", &plugin.compatible_versions.join(", "));
            }
            if let Some(schema) = &plugin.config_schema {
                output::key_value("Config schema", &schema.to_string());
            }
            output::key_value("Priority", &config.priority.to_string());
            output::key_value("Manifest", &found.path.display().to_string());

            println!();
        } else {
            print!("  {} {}", plugin.name, style(&plugin.version).dim());

            if !plugin.description.is_empty() {
                print!(" - {}", style(&plugin.description).dim());
            }

            println!();
        }
    }

    Ok(())
}
