//! Manifest error types.

use std::path::PathBuf;

use tether_core::TetherError;
use thiserror::Error;

/// Error type for manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read or write a manifest file.
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest content could not be parsed.
    #[error("Failed to parse plugin manifest {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// File extension is not a known manifest format.
    #[error("Unsupported manifest format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Manifest parsed but its metadata is unusable.
    #[error("Invalid plugin manifest {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: TetherError,
    },

    /// Two manifests declare the same plugin name.
    #[error("Plugin '{name}' in {path} is already declared in {first}")]
    Duplicate {
        name: String,
        path: PathBuf,
        first: PathBuf,
    },

    /// Manifest could not be serialized.
    #[error("Failed to serialize plugin manifest: {0}")]
    Serialize(String),
}

impl ManifestError {
    /// Returns the file the error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ManifestError::Io { path, .. }
            | ManifestError::Parse { path, .. }
            | ManifestError::Invalid { path, .. }
            | ManifestError::Duplicate { path, .. } => Some(path),
            ManifestError::UnsupportedFormat(path) => Some(path),
            ManifestError::Serialize(_) => None,
        }
    }
}

/// Result type for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;
