//! Plugin lifecycle states and the operations that move between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Unloaded,
    Loaded,
    Enabled,
    Disabled,
    Error,
}

/// A lifecycle operation requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Load,
    Enable,
    Disable,
    Unload,
    Configure,
}

impl PluginState {
    /// Returns the state reached when `operation` succeeds from this state,
    /// or `None` if the transition is not allowed.
    ///
    /// | from                     | operation | to      |
    /// |--------------------------|-----------|---------|
    /// | unloaded                 | load      | loaded  |
    /// | loaded, disabled         | enable    | enabled |
    /// | enabled                  | disable   | disabled|
    /// | loaded, disabled, error  | unload    | unloaded|
    /// | anything but unloaded    | configure | (same)  |
    pub fn next(self, operation: Operation) -> Option<PluginState> {
        use Operation::*;
        use PluginState::*;

        match (self, operation) {
            (Unloaded, Load) => Some(Loaded),
            (Loaded | Disabled, Enable) => Some(Enabled),
            (Enabled, Disable) => Some(Disabled),
            (Loaded | Disabled | Error, Unload) => Some(Unloaded),
            (Unloaded, Configure) => None,
            (state, Configure) => Some(state),
            _ => None,
        }
    }

    /// Returns true if `operation` is allowed from this state.
    pub fn allows(self, operation: Operation) -> bool {
        self.next(operation).is_some()
    }

    /// Returns the lowercase name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            PluginState::Unloaded => "unloaded",
            PluginState::Loaded => "loaded",
            PluginState::Enabled => "enabled",
            PluginState::Disabled => "disabled",
            PluginState::Error => "error",
        }
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PluginState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unloaded" => Ok(PluginState::Unloaded),
            "loaded" => Ok(PluginState::Loaded),
            "enabled" => Ok(PluginState::Enabled),
            "disabled" => Ok(PluginState::Disabled),
            "error" => Ok(PluginState::Error),
            other => Err(format!("unknown plugin state '{}'", other)),
        }
    }
}

impl Operation {
    /// Returns the name of the hook this operation invokes.
    pub fn hook_name(self) -> &'static str {
        match self {
            Operation::Load => "on_load",
            Operation::Enable => "on_enable",
            Operation::Disable => "on_disable",
            Operation::Unload => "on_unload",
            Operation::Configure => "on_config_change",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Enable => "enable",
            Operation::Disable => "disable",
            Operation::Unload => "unload",
            Operation::Configure => "configure",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        assert_eq!(
            PluginState::Unloaded.next(Operation::Load),
            Some(PluginState::Loaded)
        );
        assert_eq!(
            PluginState::Loaded.next(Operation::Enable),
            Some(PluginState::Enabled)
        );
        assert_eq!(
            PluginState::Enabled.next(Operation::Disable),
            Some(PluginState::Disabled)
        );
        assert_eq!(
            PluginState::Disabled.next(Operation::Enable),
            Some(PluginState::Enabled)
        );
        assert_eq!(
            PluginState::Error.next(Operation::Unload),
            Some(PluginState::Unloaded)
        );
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!PluginState::Error.allows(Operation::Enable));
        assert!(!PluginState::Error.allows(Operation::Disable));
        assert!(!PluginState::Enabled.allows(Operation::Unload));
        assert!(!PluginState::Loaded.allows(Operation::Load));
        assert!(!PluginState::Unloaded.allows(Operation::Enable));
        assert!(!PluginState::Unloaded.allows(Operation::Configure));
    }

    #[test]
    fn test_configure_keeps_state() {
        for state in [
            PluginState::Loaded,
            PluginState::Enabled,
            PluginState::Disabled,
            PluginState::Error,
        ] {
            assert_eq!(state.next(Operation::Configure), Some(state));
        }
    }

    #[test]
    fn test_state_parse_and_display() {
        assert_eq!("Enabled".parse::<PluginState>(), Ok(PluginState::Enabled));
        assert_eq!(PluginState::Error.to_string(), "error");
        assert!("running".parse::<PluginState>().is_err());
        assert_eq!(Operation::Configure.hook_name(), "on_config_change");
    }
}
