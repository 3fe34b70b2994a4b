//! Subtask data model for the execution graph.
//!
//! Subtasks are the atomic units of work assigned to workers. A
//! [`SubtaskSpec`] is the immutable plan entry produced by decomposition; a
//! [`Subtask`] wraps one spec and tracks status, assignment, timing, results,
//! and retry accounting while the coordinator drives it to a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Default estimated duration hint assigned when decomposition omits one.
pub const DEFAULT_ESTIMATED_DURATION: u32 = 3;

/// Identifier for a subtask, unique within one orchestration run.
///
/// Identifiers are chosen by the decomposer (e.g. "task-1") rather than
/// generated, so this is a newtype over `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubtaskId(pub String);

impl SubtaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubtaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubtaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Subtask status in its lifecycle.
///
/// Transitions are pending → running → {completed | failed}. Retries loop
/// inside Running; a subtask is never externally observable as pending again
/// once dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SubtaskStatus {
    /// Created but not yet dispatched.
    Pending,
    /// Currently executing (possibly mid-retry).
    Running,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

impl Default for SubtaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtaskStatus::Pending => write!(f, "pending"),
            SubtaskStatus::Running => write!(f, "running"),
            SubtaskStatus::Completed => write!(f, "completed"),
            SubtaskStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Immutable subtask plan entry produced by decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSpec {
    /// Identifier, unique within the decomposition run.
    pub id: SubtaskId,
    /// Human-readable description handed to the worker.
    pub description: String,
    /// Worker type this subtask is assigned to.
    pub worker_type: String,
    /// Identifiers of subtasks that must complete first.
    pub dependencies: Vec<SubtaskId>,
    /// Advisory duration hint on a 1-5 scale; scheduling ignores it.
    #[serde(default = "default_estimated_duration")]
    pub estimated_duration: u32,
}

fn default_estimated_duration() -> u32 {
    DEFAULT_ESTIMATED_DURATION
}

impl SubtaskSpec {
    /// Create a spec with no dependencies and the default duration hint.
    pub fn new(id: impl Into<String>, description: &str, worker_type: &str) -> Self {
        Self {
            id: SubtaskId::new(id),
            description: description.to_string(),
            worker_type: worker_type.to_string(),
            dependencies: Vec::new(),
            estimated_duration: DEFAULT_ESTIMATED_DURATION,
        }
    }

    /// Add dependencies, builder-style.
    pub fn with_dependencies(mut self, deps: Vec<SubtaskId>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// Mutable execution record for one subtask.
///
/// Owned exclusively by the coordinator for the duration of a run. Concurrent
/// execution hands the record to the engine by value and writes the terminal
/// record back, so no subtask ever mutates another's fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    /// The plan entry this record executes.
    pub spec: SubtaskSpec,
    /// Current execution status.
    pub status: SubtaskStatus,
    /// Worker output, present iff completed.
    pub result: Option<String>,
    /// Worker type recorded at dispatch time.
    pub assigned_worker: Option<String>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of failed attempts so far.
    pub retry_count: u32,
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
}

impl Subtask {
    /// Wrap a spec in a fresh pending execution record.
    pub fn from_spec(spec: SubtaskSpec, max_retries: u32) -> Self {
        Self {
            spec,
            status: SubtaskStatus::Pending,
            result: None,
            assigned_worker: None,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries,
        }
    }

    pub fn id(&self) -> &SubtaskId {
        &self.spec.id
    }

    /// Begin execution: transition to Running, record dispatch details.
    pub fn start(&mut self) {
        self.status = SubtaskStatus::Running;
        self.started_at = Some(Utc::now());
        self.assigned_worker = Some(self.spec.worker_type.clone());
    }

    /// Finish successfully with the worker's output.
    pub fn complete(&mut self, result: String) {
        self.status = SubtaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    /// Finish unsuccessfully with an error message.
    pub fn fail(&mut self, error: &str) {
        self.status = SubtaskStatus::Failed {
            error: error.to_string(),
        };
        self.completed_at = Some(Utc::now());
    }

    /// Whether the subtask reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            SubtaskStatus::Completed | SubtaskStatus::Failed { .. }
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, SubtaskStatus::Completed)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, SubtaskStatus::Pending)
    }

    /// Error message if failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SubtaskStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Serialize the record to a JSON map for logging and result snapshots.
    pub fn to_value(&self) -> serde_json::Value {
        json!({
            "task_id": self.spec.id.as_str(),
            "description": self.spec.description,
            "worker_type": self.spec.worker_type,
            "dependencies": self.spec.dependencies,
            "estimated_duration": self.spec.estimated_duration,
            "status": self.status,
            "result": self.result,
            "error": self.error(),
            "assigned_worker": self.assigned_worker,
            "started_at": self.started_at,
            "completed_at": self.completed_at,
            "retry_count": self.retry_count,
        })
    }
}
