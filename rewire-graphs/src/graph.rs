// Class relationship graph — petgraph projection with name↔index maps and
// bounded-BFS neighborhood lookup.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::{ClassRelations, Result};

/// Directed structural dependency graph for one codebase tree.
///
/// Nodes are class names. An edge `A → B` means A structurally references B
/// ("calls"); the reverse direction ("called_by") is a derived view over the
/// same edges, never mutated directly. Referenced-but-undeclared names are
/// kept as leaf nodes so they still surface in neighborhoods.
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    graph: DiGraph<String, ()>,
    name_to_index: HashMap<String, NodeIndex>,
    /// Names backed by an actual declaration in this tree. Only these are
    /// expanded during transitive neighborhood traversal.
    declared: HashSet<String>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from per-class extraction results.
    pub fn from_relations<'a, I>(relations: I) -> Self
    where
        I: IntoIterator<Item = &'a ClassRelations>,
    {
        let mut graph = Self::new();
        for relation in relations {
            graph.declared.insert(relation.class_name.clone());
            let from = graph.ensure_node(&relation.class_name);
            for callee in &relation.related {
                let to = graph.ensure_node(callee);
                graph.graph.update_edge(from, to, ());
            }
        }
        graph
    }

    fn ensure_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.name_to_index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.name_to_index.insert(name.to_string(), idx);
        idx
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    /// Declared class names in sorted order.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.declared.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn class_count(&self) -> usize {
        self.declared.len()
    }

    /// Names this class structurally references.
    pub fn calls(&self, name: &str) -> BTreeSet<String> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Names that structurally reference this class (derived view).
    pub fn called_by(&self, name: &str) -> BTreeSet<String> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> BTreeSet<String> {
        let Some(&idx) = self.name_to_index.get(name) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// The depth-bounded neighborhood of a class: the union of calls and
    /// called_by, expanded by repeated frontier traversal without revisiting
    /// already-expanded nodes. Only declared classes are expanded; undeclared
    /// references contribute as leaves.
    pub fn neighborhood(&self, name: &str, depth: u32) -> BTreeSet<String> {
        let mut neighborhood = BTreeSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier: HashSet<String> = HashSet::from([name.to_string()]);

        for _ in 0..depth {
            let mut next = HashSet::new();
            for class in &frontier {
                if !self.declared.contains(class) || visited.contains(class) {
                    continue;
                }
                let ring: BTreeSet<String> = self
                    .calls(class)
                    .into_iter()
                    .chain(self.called_by(class))
                    .collect();
                neighborhood.extend(ring.iter().cloned());
                next.extend(ring);
                visited.insert(class.clone());
            }
            frontier = next.into_iter().filter(|c| !visited.contains(c)).collect();
            if frontier.is_empty() {
                break;
            }
        }
        neighborhood
    }

    /// Serialize as the persisted artifact form: class name → sorted list of
    /// called names, declared classes only.
    pub fn to_value(&self) -> serde_json::Value {
        let map: BTreeMap<&str, Vec<String>> = self
            .class_names()
            .into_iter()
            .map(|name| (name, self.calls(name).into_iter().collect()))
            .collect();
        serde_json::json!(map)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_value())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
