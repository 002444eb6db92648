//! Directory scan for plugin manifests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tether_core::{PluginConfig, PluginMetadata};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ManifestError;
use crate::manifest::{PluginManifest, is_manifest_file};

/// A manifest found on disk.
#[derive(Debug, Clone)]
pub struct DiscoveredManifest {
    /// File the manifest was read from.
    pub path: PathBuf,

    /// Parsed manifest.
    pub manifest: PluginManifest,
}

/// Result of scanning a directory tree.
///
/// Files that cannot be read or parsed are kept in `errors` and do not
/// stop the scan.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Valid manifests, ordered by path.
    pub manifests: Vec<DiscoveredManifest>,

    /// Per-file failures.
    pub errors: Vec<ManifestError>,
}

impl Discovery {
    /// Returns true if every manifest file was loaded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the discovered metadata, in discovery order.
    pub fn metadata(&self) -> Vec<PluginMetadata> {
        self.manifests
            .iter()
            .map(|m| m.manifest.plugin.clone())
            .collect()
    }

    /// Returns the configs declared by manifests, keyed by plugin name.
    pub fn configs(&self) -> HashMap<String, PluginConfig> {
        self.manifests
            .iter()
            .filter_map(|m| {
                let config = m.manifest.config.clone()?;
                Some((m.manifest.plugin.name.clone(), config))
            })
            .collect()
    }

    /// Splits into the inputs of a batch load.
    pub fn into_batch(self) -> (Vec<PluginMetadata>, HashMap<String, PluginConfig>) {
        let mut plugins = Vec::with_capacity(self.manifests.len());
        let mut configs = HashMap::new();

        for found in self.manifests {
            let (metadata, config) = found.manifest.into_parts();
            configs.insert(metadata.name.clone(), config);
            plugins.push(metadata);
        }

        (plugins, configs)
    }
}

/// Recursively scans `root` for manifest files.
///
/// Hidden directories are skipped. When two manifests declare the same
/// plugin name the first one by path wins and the second is reported as
/// a duplicate.
pub fn discover(root: &Path) -> Discovery {
    let mut discovery = Discovery::default();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            e.file_name().to_str().is_none_or(|s| !s.starts_with('.'))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), error = %err, "Cannot scan plugin directory");
                discovery.errors.push(ManifestError::Io {
                    path,
                    source: err.into(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_manifest_file(entry.path()) {
            continue;
        }

        let path = entry.into_path();
        let manifest = match PluginManifest::from_file(&path) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping plugin manifest");
                discovery.errors.push(err);
                continue;
            }
        };

        if let Some(first) = seen.get(manifest.name()) {
            discovery.errors.push(ManifestError::Duplicate {
                name: manifest.name().to_string(),
                path,
                first: first.clone(),
            });
            continue;
        }

        debug!(plugin = %manifest.name(), path = %path.display(), "Discovered plugin manifest");
        seen.insert(manifest.name().to_string(), path.clone());
        discovery
            .manifests
            .push(DiscoveredManifest { path, manifest });
    }

    discovery
}
