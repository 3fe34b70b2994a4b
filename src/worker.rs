//! Worker abstraction and the per-coordinator worker registry.
//!
//! A [`Worker`] executes one subtask description and returns its output. The
//! registry maps worker type names to implementations; decomposition consults
//! the registered type names, and the execution engine looks workers up at
//! dispatch time.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::memory::{MemoryLevel, MemorySink};
use crate::mlog;
use crate::Result;

/// Output of one successful worker execution.
#[derive(Debug, Clone)]
pub struct WorkerOutput {
    /// Human-readable result text, used for aggregation.
    pub output: String,
    /// Optional structured payload for embedding callers.
    pub data: Option<serde_json::Value>,
}

impl WorkerOutput {
    /// Text-only output.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            data: None,
        }
    }

    /// Attach a structured payload, builder-style.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// A unit of execution capability, keyed by type name in the registry.
///
/// Implementations report failure through the returned `Result`; the
/// execution engine owns retry policy, so a worker should not retry
/// internally.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Execute one subtask described by `description`.
    async fn execute(&self, description: &str) -> Result<WorkerOutput>;
}

/// Registry of workers available to one coordinator.
///
/// Registration order is preserved because decomposition uses the first
/// registered type as its fallback assignment.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn Worker>>,
    order: Vec<String>,
    memory: Option<Arc<dyn MemorySink>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a memory sink that records registration events.
    pub fn with_memory(mut self, memory: Arc<dyn MemorySink>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Register a worker under a type name.
    ///
    /// Registering the same type twice replaces the worker (last write wins)
    /// without changing its position in the type order.
    pub fn register(&mut self, worker_type: &str, worker: Arc<dyn Worker>) {
        if self.workers.insert(worker_type.to_string(), worker).is_none() {
            self.order.push(worker_type.to_string());
        }
        mlog!("Registered worker type: {}", worker_type);
        if let Some(memory) = &self.memory {
            memory.store(
                &format!("worker_{}_registered", worker_type),
                json!({ "worker_type": worker_type }),
                MemoryLevel::LongTerm,
            );
        }
    }

    /// Look up a worker by type name.
    pub fn lookup(&self, worker_type: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(worker_type).cloned()
    }

    pub fn contains(&self, worker_type: &str) -> bool {
        self.workers.contains_key(worker_type)
    }

    /// Registered type names in registration order.
    pub fn worker_types(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("types", &self.order)
            .finish()
    }
}
