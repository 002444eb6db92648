//! Directed graph of plugin dependencies.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tether_core::{PluginMetadata, Result, TetherError};

/// Represents the dependency graph of a batch of plugins.
#[derive(Debug)]
pub struct DependencyGraph {
    /// Mapping from plugin name to node index.
    nodes: HashMap<String, NodeIndex>,

    /// The underlying directed graph.
    graph: DiGraph<String, ()>,
}

impl DependencyGraph {
    /// Builds the graph for a batch of plugins.
    ///
    /// Dependencies named in `available` but absent from the batch are
    /// treated as already satisfied and do not become nodes.
    pub fn build(plugins: &[PluginMetadata], available: &HashSet<String>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        // Add all plugins as nodes
        for metadata in plugins {
            metadata.validate()?;

            if nodes.contains_key(&metadata.name) {
                return Err(TetherError::DuplicatePlugin(metadata.name.clone()));
            }

            let idx = graph.add_node(metadata.name.clone());
            nodes.insert(metadata.name.clone(), idx);
        }

        // Add edges for dependencies
        for metadata in plugins {
            let to_idx = nodes[&metadata.name];

            for dep in metadata.unique_dependencies() {
                match nodes.get(dep) {
                    // Edge goes from dependency to dependent (dep -> name)
                    Some(from_idx) => {
                        graph.add_edge(*from_idx, to_idx, ());
                    }
                    None if available.contains(dep) => {}
                    None => {
                        return Err(TetherError::MissingDependency {
                            plugin: metadata.name.clone(),
                            dependency: dep.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { nodes, graph })
    }

    /// Returns the number of plugins in the graph.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns true if the graph has no plugins.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns true if the graph contains the plugin.
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Returns the direct in-batch dependencies of a plugin, sorted.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Returns the plugins that directly depend on `name`, sorted.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(idx) = self.nodes.get(name) else {
            return Vec::new();
        };

        let mut names: Vec<_> = self
            .graph
            .neighbors_directed(*idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Returns every plugin `name` depends on, directly or not, sorted.
    pub fn transitive_dependencies(&self, name: &str) -> Result<Vec<String>> {
        let idx = self
            .nodes
            .get(name)
            .ok_or_else(|| TetherError::NotFound(name.to_string()))?;

        let mut visited = HashSet::new();
        self.collect_ancestors(*idx, &mut visited);
        visited.remove(idx);

        let mut names: Vec<_> = visited.into_iter().map(|n| self.graph[n].clone()).collect();
        names.sort();
        Ok(names)
    }

    /// Collects all ancestors of a node (dependencies).
    fn collect_ancestors(&self, node: NodeIndex, visited: &mut HashSet<NodeIndex>) {
        if !visited.insert(node) {
            return;
        }

        for neighbor in self.graph.neighbors_directed(node, Direction::Incoming) {
            self.collect_ancestors(neighbor, visited);
        }
    }

    /// Computes a load order where every plugin comes after its dependencies.
    ///
    /// Kahn's algorithm; among plugins that are ready at the same time the
    /// lowest `priority` goes first, then the lexicographically smallest name.
    pub fn load_order<F>(&self, priority: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> u32,
    {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                let degree = self.graph.neighbors_directed(idx, Direction::Incoming).count();
                (idx, degree)
            })
            .collect();

        let mut ready: BTreeSet<(u32, &str, NodeIndex)> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| {
                let name = self.graph[*idx].as_str();
                (priority(name), name, *idx)
            })
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some((_, name, idx)) = ready.pop_first() {
            order.push(name.to_string());
            in_degree.remove(&idx);

            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        let next_name = self.graph[next].as_str();
                        ready.insert((priority(next_name), next_name, next));
                    }
                }
            }
        }

        if !in_degree.is_empty() {
            let remaining: HashSet<NodeIndex> = in_degree.into_keys().collect();
            return Err(TetherError::CircularDependency {
                cycle: self.find_cycle(&remaining),
            });
        }

        Ok(order)
    }

    /// Walks dependency edges among the nodes Kahn's algorithm could not
    /// emit until a node repeats. Every such node still has an unemitted
    /// dependency, so the walk always closes a cycle.
    fn find_cycle(&self, remaining: &HashSet<NodeIndex>) -> Vec<String> {
        let by_name = |a: &NodeIndex, b: &NodeIndex| self.graph[*a].cmp(&self.graph[*b]);

        let Some(start) = remaining.iter().copied().min_by(by_name) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;

        loop {
            let next = self
                .graph
                .neighbors_directed(current, Direction::Incoming)
                .filter(|n| remaining.contains(n))
                .min_by(by_name);

            let Some(next) = next else {
                break;
            };

            if let Some(pos) = path.iter().position(|n| *n == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|n| self.graph[*n].clone()).collect();
                cycle.push(self.graph[next].clone());
                return cycle;
            }

            path.push(next);
            current = next;
        }

        path.into_iter().map(|n| self.graph[n].clone()).collect()
    }

    /// Groups an order into levels by dependency depth.
    /// Plugins in the same level do not depend on each other.
    pub fn levels(&self, order: &[String]) -> Vec<Vec<String>> {
        let mut levels: Vec<Vec<String>> = Vec::new();
        let mut plugin_levels: HashMap<&str, usize> = HashMap::new();

        for name in order {
            let Some(idx) = self.nodes.get(name) else {
                continue;
            };

            // Find the maximum level of all dependencies
            let level = self
                .graph
                .neighbors_directed(*idx, Direction::Incoming)
                .filter_map(|dep_idx| plugin_levels.get(self.graph[dep_idx].as_str()).copied())
                .max()
                .map(|l| l + 1)
                .unwrap_or(0);

            plugin_levels.insert(name.as_str(), level);

            while levels.len() <= level {
                levels.push(Vec::new());
            }

            levels[level].push(name.clone());
        }

        levels
    }
}
