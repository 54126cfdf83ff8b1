//! Class dependency graph and creation ordering.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::ConfigError;

/// Directed graph with an edge from each class to every class it references.
///
/// Built once per session from normalized data and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from `(class, classes it references)` pairs.
    pub fn build<C, D, I>(dependencies: I) -> Self
    where
        I: IntoIterator<Item = (C, D)>,
        C: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let mut graph = Self::default();
        for (class_name, targets) in dependencies {
            let from = graph.node(class_name.as_ref());
            for target in targets {
                let to = graph.node(target.as_ref());
                graph.graph.update_edge(from, to, ());
            }
        }
        graph
    }

    fn node(&mut self, class_name: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(class_name) {
            return index;
        }
        let index = self.graph.add_node(class_name.to_string());
        self.nodes.insert(class_name.to_string(), index);
        index
    }

    /// Classes `class_name` references directly.
    pub fn dependencies(&self, class_name: &str) -> Vec<&str> {
        let Some(&index) = self.nodes.get(class_name) else {
            return Vec::new();
        };
        let mut targets: Vec<&str> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect();
        targets.sort_unstable();
        targets
    }

    /// Order in which classes must be created: dependencies first.
    ///
    /// A topological sort lists dependents before their dependencies, so the
    /// creation order is its reverse. Fails with the edges of one cycle if
    /// the graph has any, self-references included.
    pub fn creation_order(&self) -> Result<Vec<String>, ConfigError> {
        match toposort(&self.graph, None) {
            Ok(sorted) => Ok(sorted
                .into_iter()
                .rev()
                .map(|index| self.graph[index].clone())
                .collect()),
            Err(_) => Err(ConfigError::CircularDependency {
                edges: self.find_cycle(),
            }),
        }
    }

    /// Edges of one cycle, in traversal order.
    fn find_cycle(&self) -> Vec<(String, String)> {
        for component in tarjan_scc(&self.graph) {
            let start = component[0];
            if component.len() == 1 && self.graph.find_edge(start, start).is_none() {
                continue;
            }
            let members: HashSet<NodeIndex> = component.iter().copied().collect();
            if let Some(path) = self.path_back_to(start, &members) {
                return path
                    .windows(2)
                    .map(|pair| (self.graph[pair[0]].clone(), self.graph[pair[1]].clone()))
                    .collect();
            }
        }
        Vec::new()
    }

    /// Shortest walk `start -> ... -> start` inside one strongly connected component.
    fn path_back_to(&self, start: NodeIndex, members: &HashSet<NodeIndex>) -> Option<Vec<NodeIndex>> {
        let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            let mut successors: Vec<NodeIndex> = self.graph.neighbors(node).collect();
            successors.sort_unstable();
            for next in successors {
                if next == start {
                    let mut path = vec![start, node];
                    let mut cursor = node;
                    while cursor != start {
                        cursor = previous[&cursor];
                        path.push(cursor);
                    }
                    path.reverse();
                    return Some(path);
                }
                if members.contains(&next) && !previous.contains_key(&next) {
                    previous.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}
