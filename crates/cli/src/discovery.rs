//! Plugin directory lookup and manifest loading.

use std::path::{Path, PathBuf};

use miette::{Result, miette};
use tether_plugin::Discovery;

use crate::output;

/// Default plugin directory name, relative to the working directory.
const PLUGIN_DIR_NAME: &str = "plugins";

/// Returns the plugin directory to use.
///
/// An explicit directory (flag or `TETHER_PLUGIN_DIR`) wins. Otherwise
/// `./plugins` is used if it exists, then `<config dir>/tether/plugins`.
pub fn plugin_dir(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    plugin_dir_from(explicit, &cwd, dirs::config_dir().as_deref())
}

/// Resolves the plugin directory against the given working and config
/// directories.
pub fn plugin_dir_from(explicit: Option<&Path>, cwd: &Path, config_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    let local = cwd.join(PLUGIN_DIR_NAME);
    if local.is_dir() {
        return local;
    }

    match config_dir {
        Some(config) if config.join("tether").join(PLUGIN_DIR_NAME).is_dir() => {
            config.join("tether").join(PLUGIN_DIR_NAME)
        }
        _ => local,
    }
}

/// Scans the plugin directory, printing a warning for every manifest that
/// could not be loaded.
pub fn load_plugins(dir: &Path) -> Result<Discovery> {
    if !dir.is_dir() {
        return Err(miette!(
            "Plugin directory not found: {} (use --dir or TETHER_PLUGIN_DIR)",
            dir.display()
        ));
    }

    let discovery = tether_plugin::discover(dir);
    for err in &discovery.errors {
        output::warning(&err.to_string());
    }

    Ok(discovery)
}
