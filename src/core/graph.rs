//! Dependency graph over one run's subtask specs.
//!
//! This module provides the [`SubtaskGraph`] structure that represents
//! subtask prerequisites as a directed graph, enabling concurrent execution
//! of independent subtasks. Unlike a strict DAG builder it accepts malformed
//! input: a dependency naming an id with no matching spec is recorded as
//! dangling (the dependent can never become ready), and cycles are admitted
//! at build time. Both conditions surface later as a scheduling stall with
//! diagnostics, never as a construction error.

use crate::core::subtask::{SubtaskId, SubtaskSpec};
use crate::error::{Error, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// The subtask dependency graph for one orchestration run.
///
/// Nodes are subtask ids; an edge from A to B means B depends on A.
/// Insertion order of specs is preserved for ready-set output, since callers
/// use it for display and final-output ordering.
pub struct SubtaskGraph {
    /// The underlying directed graph.
    graph: DiGraph<SubtaskId, ()>,
    /// Index mapping from SubtaskId to NodeIndex for fast lookups.
    node_index: HashMap<SubtaskId, NodeIndex>,
    /// Dependencies that reference no spec in the run, per dependent id.
    dangling: HashMap<SubtaskId, Vec<SubtaskId>>,
    /// Spec ids in insertion order.
    order: Vec<SubtaskId>,
}

impl SubtaskGraph {
    /// Build a graph from a decomposition's specs.
    ///
    /// # Errors
    /// Returns a validation error if two specs share an id. Unresolvable
    /// dependencies and cycles are not errors; they are recorded and will
    /// manifest as a stall.
    pub fn from_specs(specs: &[SubtaskSpec]) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_index = HashMap::new();
        let mut order = Vec::with_capacity(specs.len());

        for spec in specs {
            if node_index.contains_key(&spec.id) {
                return Err(Error::Validation(format!(
                    "Duplicate subtask id in decomposition: {}",
                    spec.id
                )));
            }
            let index = graph.add_node(spec.id.clone());
            node_index.insert(spec.id.clone(), index);
            order.push(spec.id.clone());
        }

        let mut dangling: HashMap<SubtaskId, Vec<SubtaskId>> = HashMap::new();
        for spec in specs {
            let to = node_index[&spec.id];
            for dep in &spec.dependencies {
                match node_index.get(dep) {
                    Some(&from) => {
                        graph.add_edge(from, to, ());
                    }
                    None => {
                        dangling
                            .entry(spec.id.clone())
                            .or_default()
                            .push(dep.clone());
                    }
                }
            }
        }

        Ok(Self {
            graph,
            node_index,
            dangling,
            order,
        })
    }

    /// Number of subtasks in the graph.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of resolvable dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Check if the graph contains a subtask id.
    pub fn contains(&self, id: &SubtaskId) -> bool {
        self.node_index.contains_key(id)
    }

    /// Whether `id` has a dependency that resolves to no spec in the run.
    pub fn has_dangling_dependency(&self, id: &SubtaskId) -> bool {
        self.dangling.contains_key(id)
    }

    /// Whether the resolvable portion of the graph contains a cycle.
    ///
    /// Used only for stall diagnostics; cyclic graphs are legal input.
    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Compute the ready set: pending subtasks whose every prerequisite is
    /// completed.
    ///
    /// A subtask with a dangling dependency is never ready. The returned ids
    /// preserve spec insertion order.
    pub fn ready_ids(
        &self,
        completed: &HashSet<SubtaskId>,
        pending: &HashSet<SubtaskId>,
    ) -> Vec<SubtaskId> {
        self.order
            .iter()
            .filter(|id| pending.contains(id))
            .filter(|id| !self.dangling.contains_key(id))
            .filter(|id| {
                let index = self.node_index[id];
                self.graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .all(|dep_index| completed.contains(&self.graph[dep_index]))
            })
            .cloned()
            .collect()
    }

    /// Report each pending subtask's unmet prerequisites.
    ///
    /// Covers both in-graph prerequisites that are not completed and dangling
    /// references. Intended for stall logging.
    pub fn stuck_report(
        &self,
        completed: &HashSet<SubtaskId>,
        pending: &HashSet<SubtaskId>,
    ) -> Vec<(SubtaskId, Vec<SubtaskId>)> {
        self.order
            .iter()
            .filter(|id| pending.contains(id))
            .map(|id| {
                let index = self.node_index[id];
                let mut unmet: Vec<SubtaskId> = self
                    .graph
                    .neighbors_directed(index, petgraph::Direction::Incoming)
                    .map(|dep_index| self.graph[dep_index].clone())
                    .filter(|dep| !completed.contains(dep))
                    .collect();
                if let Some(dangling) = self.dangling.get(id) {
                    unmet.extend(dangling.iter().cloned());
                }
                (id.clone(), unmet)
            })
            .collect()
    }
}

impl Default for SubtaskGraph {
    fn default() -> Self {
        Self {
            graph: DiGraph::new(),
            node_index: HashMap::new(),
            dangling: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SubtaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtaskGraph")
            .field("subtasks", &self.len())
            .field("dependencies", &self.dependency_count())
            .field("dangling", &self.dangling.len())
            .finish()
    }
}
