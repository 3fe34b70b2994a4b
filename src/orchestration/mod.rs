//! Orchestration pipeline: decomposition, execution, and coordination.

pub mod coordinator;
pub mod decomposer;
pub mod executor;

pub use coordinator::{Coordinator, OrchestrationResult, RunEvent};
pub use decomposer::{fallback_decompose, Decomposer, KeywordDecomposer};
pub use executor::execute_subtask;
