//! Variable dependency graph recovered from a computation log.
use crate::compute::TraceEntry;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// Which variables each variable read while it was computed.
///
/// Edges point from a dependency to the variable that consumed it, so a
/// topological order lists dependencies first.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn from_log(entries: &[TraceEntry]) -> Self {
        let mut deps = Self::default();
        for entry in entries {
            let node = deps.node(&entry.key.variable);
            if let Some(parent) = &entry.parent {
                let consumer = deps.node(&parent.variable);
                if consumer != node && deps.graph.find_edge(node, consumer).is_none() {
                    deps.graph.add_edge(node, consumer, ());
                }
            }
        }
        deps
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Every variable after the ones it depends on.
    ///
    /// Fails with the name of a variable on a cycle. Cycles can only show up
    /// when a variable reads itself over another period.
    pub fn dependency_order(&self) -> Result<Vec<&str>, String> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.graph[idx].as_str()).collect())
            .map_err(|cycle| self.graph[cycle.node_id()].clone())
    }

    /// Variables read directly by `name`.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Variables that read `name` directly.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{CacheKey, EntityInstance, Source};
    use crate::period::Period;

    fn key(variable: &str) -> CacheKey {
        CacheKey::new(variable, &EntityInstance::new("individu", "1"), Period::month(2024, 1).unwrap())
    }

    fn read(variable: &str, by: Option<&str>) -> TraceEntry {
        TraceEntry {
            request: 1,
            depth: usize::from(by.is_some()),
            key: key(variable),
            parent: by.map(key),
            source: Source::Cache,
            value: None,
        }
    }

    #[test]
    fn test_diamond_dependency_order() {
        // revenu <- salaire, revenu <- chomage, salaire <- brut, chomage <- brut
        let log = [
            read("revenu", None),
            read("salaire", Some("revenu")),
            read("brut", Some("salaire")),
            read("chomage", Some("revenu")),
            read("brut", Some("chomage")),
        ];
        let graph = DependencyGraph::from_log(&log);
        assert_eq!(graph.len(), 4);

        let order = graph.dependency_order().unwrap();
        let pos = |name: &str| order.iter().position(|&n| n == name).unwrap();
        assert!(pos("brut") < pos("salaire"));
        assert!(pos("brut") < pos("chomage"));
        assert!(pos("salaire") < pos("revenu"));
        assert!(pos("chomage") < pos("revenu"));

        assert_eq!(graph.dependencies_of("revenu"), vec!["chomage", "salaire"]);
        assert_eq!(graph.dependents_of("brut"), vec!["chomage", "salaire"]);
        assert!(graph.dependencies_of("inconnu").is_empty());
    }

    #[test]
    fn test_self_reads_are_not_edges_but_cycles_are_reported() {
        let log = [read("anciennete", None), read("anciennete", Some("anciennete"))];
        assert_eq!(DependencyGraph::from_log(&log).dependency_order().unwrap(), vec!["anciennete"]);

        let log = [read("a", Some("b")), read("b", Some("a"))];
        assert!(DependencyGraph::from_log(&log).dependency_order().is_err());
    }
}
