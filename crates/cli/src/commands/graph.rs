//! Graph command implementation.

use std::collections::HashSet;
use std::path::Path;

use console::style;
use miette::{Result, miette};
use tether_core::PluginMetadata;
use tether_engine::{DependencyGraph, DependencyResolver};

use crate::discovery;

/// Shows the dependency graph.
pub fn execute(dir: &Path, target: Option<&str>, format: &str) -> Result<()> {
    let (plugins, configs) = discovery::load_plugins(dir)?.into_batch();

    let resolver = DependencyResolver::new();
    let graph = resolver
        .graph(&plugins)
        .map_err(|e| miette!("Failed to build dependency graph: {}", e))?;
    let order = resolver
        .resolve(&plugins, &configs)
        .map_err(|e| miette!("Failed to resolve load order: {}", e))?;

    let shown: HashSet<String> = match target {
        Some(name) => {
            let mut names: HashSet<String> = graph
                .transitive_dependencies(name)
                .map_err(|_| miette!("Unknown plugin: {}", name))?
                .into_iter()
                .collect();
            names.insert(name.to_string());
            names
        }
        None => order.iter().cloned().collect(),
    };
    let order: Vec<String> = order.into_iter().filter(|n| shown.contains(n)).collect();

    match format {
        "ascii" => print_ascii(&graph, &order),
        "dot" => print_dot(&graph, &plugins, &order),
        _ => return Err(miette!("Unknown format: {}. Use 'ascii' or 'dot'", format)),
    }

    Ok(())
}

/// Prints plugins level by level with their direct dependencies.
fn print_ascii(graph: &DependencyGraph, order: &[String]) {
    println!("Dependency Graph:");

    for (depth, level) in graph.levels(order).iter().enumerate() {
        println!();
        println!("{}", style(format!("Level {}", depth)).bold());

        for name in level {
            println!("● {}", name);
            for dep in graph.dependencies(name) {
                println!("  └─ {}", style(dep).dim());
            }
        }
    }
}

/// Prints a DOT format representation for Graphviz.
fn print_dot(graph: &DependencyGraph, plugins: &[PluginMetadata], order: &[String]) {
    println!("digraph tether {{");
    println!("  rankdir=LR;");
    println!("  node [shape=box];");
    println!();

    for name in order {
        let label = plugins
            .iter()
            .find(|p| &p.name == name)
            .map(|p| format!("{}\\n{}", p.name, p.version))
            .unwrap_or_else(|| name.clone());
        println!("  \"{}\" [label=\"{}\"];", name, label);

        for dep in graph.dependencies(name) {
            println!("  \"{}\" -> \"{}\";", dep, name);
        }
    }

    println!("}}");
}
