//! Terminal output formatting.

use console::{StyledObject, style};
use tether_core::PluginState;

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", style("⚠").yellow().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), message);
}

/// Prints a header for a section.
pub fn section_header(title: &str) {
    println!("\n{}", style(format!("── {} ──", title)).bold());
}

/// Prints a key-value pair.
pub fn key_value(key: &str, value: &str) {
    println!("    {}: {}", style(key).dim(), value);
}

/// Prints a state transition.
pub fn transition(plugin: &str, from: PluginState, to: PluginState) {
    println!(
        "  {} {} {} {}",
        style("→").dim(),
        style(plugin).cyan(),
        style(from).dim(),
        state_label(to)
    );
}

/// Styles a state name by severity.
pub fn state_label(state: PluginState) -> StyledObject<&'static str> {
    let label = style(state.as_str());
    match state {
        PluginState::Enabled => label.green().bold(),
        PluginState::Loaded => label.blue(),
        PluginState::Disabled => label.yellow(),
        PluginState::Error => label.red().bold(),
        PluginState::Unloaded => label.dim(),
    }
}

/// Prints a summary line.
pub fn summary(ok: bool, message: &str) {
    println!();

    if ok {
        println!("{}: {}", style("SUCCESS").green().bold(), message);
    } else {
        println!("{}: {}", style("FAILED").red().bold(), message);
    }
}
