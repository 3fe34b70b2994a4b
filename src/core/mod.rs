//! Core data model: subtask records and the dependency graph.

pub mod graph;
pub mod subtask;

pub use graph::SubtaskGraph;
pub use subtask::{Subtask, SubtaskId, SubtaskSpec, SubtaskStatus};
