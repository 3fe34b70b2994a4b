//! Test fixtures for integration tests.
//!
//! Provides mock workers with scripted behavior, registry builders, and
//! canned decomposition plans.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use maestro::{
    Decomposer, Error, OrchestratorConfig, Result, SubtaskId, SubtaskSpec, Worker, WorkerOutput,
    WorkerRegistry,
};

/// Default config with retry backoff disabled so retry tests run instantly.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        retry_backoff_ms: 0,
        ..Default::default()
    }
}

/// Worker that always succeeds with a fixed output.
pub struct ScriptedWorker {
    output: String,
}

impl ScriptedWorker {
    pub fn new(output: &str) -> Arc<Self> {
        Arc::new(Self {
            output: output.to_string(),
        })
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    async fn execute(&self, _description: &str) -> Result<WorkerOutput> {
        Ok(WorkerOutput::text(self.output.clone()))
    }
}

/// Worker that always fails.
pub struct FailingWorker;

#[async_trait]
impl Worker for FailingWorker {
    async fn execute(&self, _description: &str) -> Result<WorkerOutput> {
        Err(Error::Execution("scripted failure".to_string()))
    }
}

/// Worker that fails a fixed number of times, then succeeds.
pub struct FlakyWorker {
    failures_before_success: u32,
    attempts: AtomicU32,
}

impl FlakyWorker {
    pub fn new(failures_before_success: u32) -> Arc<Self> {
        Arc::new(Self {
            failures_before_success,
            attempts: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl Worker for FlakyWorker {
    async fn execute(&self, _description: &str) -> Result<WorkerOutput> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures_before_success {
            Err(Error::Execution(format!("attempt {} failed", attempt + 1)))
        } else {
            Ok(WorkerOutput::text("recovered"))
        }
    }
}

/// Worker that records every description it executes, in dispatch order.
pub struct RecordingWorker {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingWorker {
    pub fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (Arc::new(Self { log: log.clone() }), log)
    }
}

#[async_trait]
impl Worker for RecordingWorker {
    async fn execute(&self, description: &str) -> Result<WorkerOutput> {
        self.log.lock().unwrap().push(description.to_string());
        Ok(WorkerOutput::text(format!("done: {}", description)))
    }
}

/// Worker that sleeps before succeeding, to vary completion order within a
/// batch. The delay is parsed from a `sleep:<ms>` prefix on the description.
pub struct SleepyWorker;

#[async_trait]
impl Worker for SleepyWorker {
    async fn execute(&self, description: &str) -> Result<WorkerOutput> {
        let ms = description
            .strip_prefix("sleep:")
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse::<u64>().ok())
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(WorkerOutput::text(format!("done: {}", description)))
    }
}

/// Registry with scripted research, analysis, and writing workers.
pub fn phase_registry() -> WorkerRegistry {
    let mut registry = WorkerRegistry::new();
    registry.register("research", ScriptedWorker::new("research output"));
    registry.register("analysis", ScriptedWorker::new("analysis output"));
    registry.register("writing", ScriptedWorker::new("writing output"));
    registry
}

/// Decomposer that returns a fixed plan regardless of the task text.
pub struct PlanDecomposer(pub Vec<SubtaskSpec>);

#[async_trait]
impl Decomposer for PlanDecomposer {
    async fn decompose(&self, _task: &str, _worker_types: &[String]) -> Result<Vec<SubtaskSpec>> {
        Ok(self.0.clone())
    }
}

/// A strictly sequential plan of `n` subtasks, each depending on the last.
pub fn chain_plan(n: usize, worker_type: &str) -> Vec<SubtaskSpec> {
    (1..=n)
        .map(|i| {
            let spec = SubtaskSpec::new(
                format!("task-{}", i),
                &format!("step {}", i),
                worker_type,
            );
            if i > 1 {
                spec.with_dependencies(vec![SubtaskId::new(format!("task-{}", i - 1))])
            } else {
                spec
            }
        })
        .collect()
}

/// The classic diamond: a, then b and c in parallel, then d.
pub fn diamond_plan(worker_type: &str) -> Vec<SubtaskSpec> {
    vec![
        SubtaskSpec::new("a", "a work", worker_type),
        SubtaskSpec::new("b", "b work", worker_type)
            .with_dependencies(vec![SubtaskId::new("a")]),
        SubtaskSpec::new("c", "c work", worker_type)
            .with_dependencies(vec![SubtaskId::new("a")]),
        SubtaskSpec::new("d", "d work", worker_type)
            .with_dependencies(vec![SubtaskId::new("b"), SubtaskId::new("c")]),
    ]
}
