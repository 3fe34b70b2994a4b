//! Maestro: dependency-aware task orchestration over pluggable workers.
//!
//! A free-text task is decomposed into subtasks, scheduled by dependency,
//! executed concurrently in batches with per-subtask retries, and aggregated
//! into one result. See [`orchestration::Coordinator`] for the entry point.

pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod memory;
pub mod orchestration;
pub mod worker;

pub use config::OrchestratorConfig;
pub use core::{Subtask, SubtaskGraph, SubtaskId, SubtaskSpec, SubtaskStatus};
pub use error::{Error, Result};
pub use memory::{InMemorySink, MemoryLevel, MemorySink};
pub use orchestration::{
    Coordinator, Decomposer, KeywordDecomposer, OrchestrationResult, RunEvent,
};
pub use worker::{Worker, WorkerOutput, WorkerRegistry};
