//! Plugin metadata.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TetherError};

/// Immutable description of a plugin.
///
/// `name` is the primary key used by the resolver, registry and manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin name (unique identifier).
    pub name: String,

    /// Plugin version.
    pub version: String,

    /// Plugin author.
    #[serde(default)]
    pub author: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Names of plugins that must be enabled before this one.
    #[serde(default, deserialize_with = "dedup_strings")]
    pub dependencies: Vec<String>,

    /// Free-form tags used for filtering.
    #[serde(default, deserialize_with = "dedup_strings")]
    pub tags: Vec<String>,

    /// Factory key, when it differs from the plugin name.
    #[serde(default)]
    pub entry_point: Option<String>,

    /// Host versions this plugin declares itself compatible with.
    #[serde(default)]
    pub compatible_versions: Vec<String>,

    /// Opaque schema describing the plugin's settings.
    #[serde(default)]
    pub config_schema: Option<serde_json::Value>,
}

impl PluginMetadata {
    /// Creates new plugin metadata.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            author: String::new(),
            description: String::new(),
            dependencies: Vec::new(),
            tags: Vec::new(),
            entry_point: None,
            compatible_versions: Vec::new(),
            config_schema: None,
        }
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the dependencies. Duplicates are dropped, keeping the first occurrence.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dedup(deps.into_iter().map(Into::into));
        self
    }

    /// Sets the tags. Duplicates are dropped, keeping the first occurrence.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = dedup(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the factory key.
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    /// Sets the compatible host versions.
    pub fn with_compatible_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compatible_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the settings schema.
    pub fn with_config_schema(mut self, schema: serde_json::Value) -> Self {
        self.config_schema = Some(schema);
        self
    }

    /// Returns the dependency names without duplicates, in declaration order.
    pub fn unique_dependencies(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.dependencies.len());
        for dep in &self.dependencies {
            if !seen.contains(&dep.as_str()) {
                seen.push(dep.as_str());
            }
        }
        seen
    }

    /// Returns true if this plugin declares `name` as a dependency.
    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d == name)
    }

    /// Returns true if the plugin carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns the key used to look up this plugin's factory.
    pub fn factory_key(&self) -> &str {
        self.entry_point.as_deref().unwrap_or(&self.name)
    }

    /// Checks the structural invariants of the metadata.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TetherError::InvalidMetadata {
                name: self.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }

        if let Some(dep) = self.dependencies.iter().find(|d| d.trim().is_empty()) {
            return Err(TetherError::InvalidMetadata {
                name: self.name.clone(),
                reason: format!("dependency name '{}' is empty", dep),
            });
        }

        Ok(())
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn dedup_strings<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<String>::deserialize(deserializer)?;
    Ok(dedup(items.into_iter()))
}
