//! Tether Plugin - Manifest files and directory discovery for Tether plugins.
//!
//! A plugin is described on disk by a `plugin.json`, `plugin.toml` or
//! `plugin.yaml` file holding its metadata and, optionally, its initial
//! configuration.

mod discovery;
mod error;
mod manifest;

pub use discovery::{DiscoveredManifest, Discovery, discover};
pub use error::{ManifestError, Result};
pub use manifest::{MANIFEST_STEM, ManifestFormat, PluginManifest, is_manifest_file};
