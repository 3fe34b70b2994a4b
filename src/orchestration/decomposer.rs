//! Task decomposition: turning one free-text task into subtask specs.
//!
//! Decomposition is a port: a [`Decomposer`] implementation (typically backed
//! by a language model) proposes the plan, and the deterministic
//! [`fallback_decompose`] keyword scan guarantees the coordinator always has
//! a usable plan when the port fails, returns nothing, or is absent.

use async_trait::async_trait;

use crate::core::{SubtaskId, SubtaskSpec};
use crate::Result;

/// Port for pluggable decomposition strategies.
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Propose subtask specs for `task`, given the registered worker types.
    ///
    /// An error or an empty plan makes the coordinator fall back to
    /// [`fallback_decompose`]; it never fails the run.
    async fn decompose(&self, task: &str, worker_types: &[String]) -> Result<Vec<SubtaskSpec>>;
}

/// Deterministic keyword-scan decomposition.
///
/// Scans the lowercased task text for three phases in fixed order and emits
/// one subtask per matched phase, each depending on the subtask emitted
/// immediately before it:
///
/// 1. "research" or "find" assigns a research subtask described as
///    `Research: <task>`
/// 2. "analyze" assigns an analysis subtask described as `Analyze findings`
/// 3. "write" or "report" assigns a writing subtask described as
///    `Write report`
///
/// Ids are `task-1`, `task-2`, ... in emission order. Each phase prefers its
/// matching worker type when registered, else the first registered type. If
/// no phase matches, the whole task becomes a single subtask with the
/// verbatim text.
pub fn fallback_decompose(task: &str, worker_types: &[String]) -> Vec<SubtaskSpec> {
    let text = task.to_lowercase();
    let mut specs: Vec<SubtaskSpec> = Vec::new();

    let emit = |description: String, preferred: &str, specs: &mut Vec<SubtaskSpec>| {
        let id = format!("task-{}", specs.len() + 1);
        let worker_type = pick_type(preferred, worker_types);
        let deps: Vec<SubtaskId> = specs.last().map(|s| vec![s.id.clone()]).unwrap_or_default();
        specs.push(SubtaskSpec::new(id, &description, &worker_type).with_dependencies(deps));
    };

    if text.contains("research") || text.contains("find") {
        emit(format!("Research: {}", task), "research", &mut specs);
    }
    if text.contains("analyze") {
        emit("Analyze findings".to_string(), "analysis", &mut specs);
    }
    if text.contains("write") || text.contains("report") {
        emit("Write report".to_string(), "writing", &mut specs);
    }

    if specs.is_empty() {
        let worker_type = worker_types
            .first()
            .cloned()
            .unwrap_or_else(|| "general".to_string());
        specs.push(SubtaskSpec::new("task-1", task, &worker_type));
    }

    specs
}

fn pick_type(preferred: &str, worker_types: &[String]) -> String {
    if worker_types.iter().any(|t| t == preferred) {
        return preferred.to_string();
    }
    worker_types
        .first()
        .cloned()
        .unwrap_or_else(|| "general".to_string())
}

/// The keyword scan packaged as a [`Decomposer`], for callers that want the
/// deterministic strategy as their primary one.
#[derive(Debug, Default)]
pub struct KeywordDecomposer;

#[async_trait]
impl Decomposer for KeywordDecomposer {
    async fn decompose(&self, task: &str, worker_types: &[String]) -> Result<Vec<SubtaskSpec>> {
        Ok(fallback_decompose(task, worker_types))
    }
}
