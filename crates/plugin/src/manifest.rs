//! Plugin manifest for metadata and configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tether_core::{PluginConfig, PluginMetadata};

use crate::error::{ManifestError, Result};

/// File stem shared by every manifest file.
pub const MANIFEST_STEM: &str = "plugin";

/// Serialization formats accepted for manifest files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestFormat {
    Json,
    Toml,
    Yaml,
}

impl ManifestFormat {
    /// Every supported format, in lookup order.
    pub const ALL: [ManifestFormat; 3] = [Self::Toml, Self::Json, Self::Yaml];

    /// Detects the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Returns the canonical file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
        }
    }

    /// Returns the canonical manifest file name, e.g. `plugin.toml`.
    pub fn file_name(self) -> String {
        format!("{}.{}", MANIFEST_STEM, self.extension())
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ManifestFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(format!(
                "unknown manifest format '{}' (expected json, toml or yaml)",
                other
            )),
        }
    }
}

/// Returns true if the path names a manifest file (`plugin.json`,
/// `plugin.toml`, `plugin.yaml` or `plugin.yml`).
pub fn is_manifest_file(path: &Path) -> bool {
    let stem_matches = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s == MANIFEST_STEM);
    stem_matches && ManifestFormat::from_path(path).is_some()
}

/// Plugin manifest containing metadata and optional configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin metadata.
    pub plugin: PluginMetadata,

    /// Initial plugin configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PluginConfig>,
}

impl PluginManifest {
    /// Loads and validates a manifest file, picking the format from its
    /// extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let format = ManifestFormat::from_path(path)
            .ok_or_else(|| ManifestError::UnsupportedFormat(path.to_path_buf()))?;

        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest = Self::parse(&content, format, path)?;
        manifest
            .plugin
            .validate()
            .map_err(|source| ManifestError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(manifest)
    }

    /// Parses a manifest from JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::parse(json, ManifestFormat::Json, Path::new("<json>"))
    }

    /// Parses a manifest from TOML string.
    pub fn from_toml(toml: &str) -> Result<Self> {
        Self::parse(toml, ManifestFormat::Toml, Path::new("<toml>"))
    }

    /// Parses a manifest from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::parse(yaml, ManifestFormat::Yaml, Path::new("<yaml>"))
    }

    fn parse(content: &str, format: ManifestFormat, path: &Path) -> Result<Self> {
        let parsed: std::result::Result<Self, String> = match format {
            ManifestFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ManifestFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|reason| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: reason.trim_end().to_string(),
        })
    }

    /// Converts the manifest to JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ManifestError::Serialize(e.to_string()))
    }

    /// Converts the manifest to the given format.
    pub fn render(&self, format: ManifestFormat) -> Result<String> {
        match format {
            ManifestFormat::Json => self.to_json(),
            ManifestFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ManifestError::Serialize(e.to_string()))
            }
            ManifestFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| ManifestError::Serialize(e.to_string()))
            }
        }
    }

    /// Writes the manifest to `dir`, named after the format. Returns the
    /// written path.
    pub fn write_to(&self, dir: &Path, format: ManifestFormat) -> Result<PathBuf> {
        let path = dir.join(format.file_name());
        let content = self.render(format)?;

        std::fs::write(&path, content).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Creates a minimal manifest with just name and version.
    pub fn minimal(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            plugin: PluginMetadata::new(name, version),
            config: None,
        }
    }

    /// Creates a starter manifest with a description and default config.
    pub fn template(name: impl Into<String>) -> Self {
        let name = name.into();
        let description = format!("The {} plugin", name);
        Self {
            plugin: PluginMetadata::new(name, "0.1.0").with_description(description),
            config: Some(PluginConfig::default()),
        }
    }

    /// Returns the plugin name.
    pub fn name(&self) -> &str {
        &self.plugin.name
    }

    /// Splits the manifest into metadata and effective config.
    pub fn into_parts(self) -> (PluginMetadata, PluginConfig) {
        (self.plugin, self.config.unwrap_or_default())
    }
}
