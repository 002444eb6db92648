//! Tether CLI - Inspect, validate and simulate plugin sets.

mod commands;
mod discovery;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::Result;
use tether_plugin::ManifestFormat;

#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about = "Dependency-aware plugin loader and lifecycle manager")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Plugin directory (defaults to ./plugins, then the user config dir)
    #[arg(long, env = "TETHER_PLUGIN_DIR", global = true)]
    dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered plugins
    List {
        /// Only show plugins carrying this tag
        #[arg(short, long)]
        tag: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,

        /// Print metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show dependency graph
    Graph {
        /// Plugin to focus on (shows all if not specified)
        plugin: Option<String>,

        /// Output format (ascii, dot)
        #[arg(short, long, default_value = "ascii")]
        format: String,
    },

    /// Print the resolved load order
    Order,

    /// Validate manifests and dependencies
    Validate,

    /// Load, enable and shut down the plugin set with stand-in plugins
    Simulate {
        /// Make a hook fail: NAME or NAME:HOOK (load, enable, disable, unload)
        #[arg(long, value_name = "NAME[:HOOK]")]
        fail: Vec<String>,

        /// Enable every loaded plugin, not only those configured as enabled
        #[arg(short, long)]
        all: bool,
    },

    /// Write a plugin manifest template in the current directory
    Init {
        /// Plugin name (defaults to the directory name)
        name: Option<String>,

        /// Manifest format (toml, json, yaml)
        #[arg(short, long, default_value = "toml")]
        format: ManifestFormat,

        /// Force overwrite an existing manifest
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // Init writes a manifest and doesn't need a plugin directory
    if let Commands::Init {
        name,
        format,
        force,
    } = &cli.command
    {
        return commands::init::execute(name.as_deref(), *format, *force);
    }

    let dir = discovery::plugin_dir(cli.dir.as_deref());

    match cli.command {
        Commands::List {
            tag,
            detailed,
            json,
        } => commands::list::execute(&dir, tag.as_deref(), detailed, json),

        Commands::Graph { plugin, format } => {
            commands::graph::execute(&dir, plugin.as_deref(), &format)
        }

        Commands::Order => commands::order::execute(&dir),

        Commands::Validate => commands::validate::execute(&dir),

        Commands::Simulate { fail, all } => commands::simulate::execute(&dir, &fail, all),

        Commands::Init { .. } => unreachable!("Init is handled earlier"),
    }
}
