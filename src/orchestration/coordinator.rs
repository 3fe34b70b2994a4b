//! Orchestration coordinator: one run from task text to aggregated result.
//!
//! The coordinator owns the run loop. Each iteration it computes the ready
//! set from the dependency graph, dispatches the whole batch concurrently,
//! and waits for every member to finish before looking at the graph again.
//! A run always produces an [`OrchestrationResult`]; worker failures, stalls,
//! and the iteration cap degrade the result instead of erroring out.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::core::{Subtask, SubtaskGraph, SubtaskId, SubtaskSpec, SubtaskStatus};
use crate::memory::{MemoryLevel, MemorySink};
use crate::orchestration::decomposer::{fallback_decompose, Decomposer};
use crate::orchestration::executor::execute_subtask;
use crate::worker::WorkerRegistry;
use crate::{mlog, mlog_warn};

/// Progress notifications emitted during a run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A plan was produced for the run.
    Decomposed { run_id: Uuid, subtask_count: usize },
    /// A batch of ready subtasks was dispatched.
    BatchDispatched { iteration: u32, ids: Vec<SubtaskId> },
    /// A subtask finished successfully.
    SubtaskCompleted { id: SubtaskId },
    /// A subtask reached terminal failure.
    SubtaskFailed { id: SubtaskId, error: String },
    /// No pending subtask could become ready; the run is giving up.
    Stalled { iteration: u32, pending: usize },
    /// The run finished and its result is available.
    RunFinished { run_id: Uuid, success: bool },
}

/// Aggregated outcome of one orchestration run.
#[derive(Debug, Clone)]
pub struct OrchestrationResult {
    pub run_id: Uuid,
    /// The original task text.
    pub task: String,
    pub subtask_count: usize,
    /// Subtasks that finished successfully.
    pub completed: usize,
    /// Subtasks that reached terminal failure.
    pub failed: usize,
    /// Scheduler iterations consumed.
    pub iterations: u32,
    /// True iff every subtask completed.
    pub success: bool,
    /// Completed outputs concatenated in plan order.
    pub final_output: String,
    /// Terminal (or stranded) record for every subtask, in plan order.
    pub subtasks: Vec<Subtask>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OrchestrationResult {
    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Serialize the result to a JSON map for logging and embedding callers.
    pub fn to_value(&self) -> serde_json::Value {
        json!({
            "run_id": self.run_id.to_string(),
            "task": self.task,
            "subtask_count": self.subtask_count,
            "completed": self.completed,
            "failed": self.failed,
            "iterations": self.iterations,
            "success": self.success,
            "final_output": self.final_output,
            "subtasks": self.subtasks.iter().map(|s| s.to_value()).collect::<Vec<_>>(),
            "started_at": self.started_at,
            "finished_at": self.finished_at,
            "duration_ms": self.duration().num_milliseconds(),
        })
    }
}

/// Drives orchestration runs against a worker registry.
pub struct Coordinator {
    registry: WorkerRegistry,
    decomposer: Option<Arc<dyn Decomposer>>,
    memory: Option<Arc<dyn MemorySink>>,
    config: OrchestratorConfig,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
    cancel: CancellationToken,
    history: Vec<OrchestrationResult>,
}

impl Coordinator {
    pub fn new(registry: WorkerRegistry) -> Self {
        Self {
            registry,
            decomposer: None,
            memory: None,
            config: OrchestratorConfig::default(),
            events: None,
            cancel: CancellationToken::new(),
            history: Vec::new(),
        }
    }

    /// Attach a decomposition strategy. Without one, every run uses the
    /// deterministic keyword fallback.
    pub fn with_decomposer(mut self, decomposer: Arc<dyn Decomposer>) -> Self {
        self.decomposer = Some(decomposer);
        self
    }

    /// Attach a memory sink for run side effects.
    pub fn with_memory(mut self, memory: Arc<dyn MemorySink>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Open the event channel and return its receiving end.
    ///
    /// Events from all subsequent runs arrive on this receiver. A dropped
    /// receiver is harmless; emission is best-effort.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RunEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    /// Token that stops the run loop at the next iteration barrier.
    ///
    /// Cancellation is cooperative: the in-flight batch is awaited, not
    /// aborted, and the run still returns a result.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WorkerRegistry {
        &mut self.registry
    }

    /// Results of every run this coordinator has driven, oldest first.
    pub fn history(&self) -> &[OrchestrationResult] {
        &self.history
    }

    pub fn last_result(&self) -> Option<&OrchestrationResult> {
        self.history.last()
    }

    /// Run one task end to end.
    ///
    /// Never fails: decomposition problems fall back to the keyword scan, and
    /// execution problems are reported through the result.
    pub async fn coordinate(&mut self, task: &str) -> OrchestrationResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        mlog!("Run {} started: {}", run_id, task);

        let worker_types = self.registry.worker_types();
        let (specs, graph) = self.plan(task, &worker_types).await;
        self.emit(RunEvent::Decomposed {
            run_id,
            subtask_count: specs.len(),
        });
        mlog!("Run {} decomposed into {} subtask(s)", run_id, specs.len());
        if let Some(memory) = &self.memory {
            memory.store(
                &format!("run_{}_plan", run_id),
                json!({ "task": task, "subtasks": specs }),
                MemoryLevel::Working,
            );
        }

        let mut subtasks: Vec<Subtask> = specs
            .into_iter()
            .map(|spec| Subtask::from_spec(spec, self.config.max_retries))
            .collect();
        let index: HashMap<SubtaskId, usize> = subtasks
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id().clone(), i))
            .collect();

        let mut iterations = 0u32;
        while subtasks.iter().any(|s| !s.is_finished()) {
            if iterations >= self.config.max_iterations {
                mlog_warn!(
                    "Run {} stopped at iteration cap ({})",
                    run_id,
                    self.config.max_iterations
                );
                break;
            }
            if self.cancel.is_cancelled() {
                mlog_warn!("Run {} cancelled at iteration {}", run_id, iterations);
                break;
            }
            iterations += 1;

            let completed_ids: HashSet<SubtaskId> = subtasks
                .iter()
                .filter(|s| s.is_completed())
                .map(|s| s.id().clone())
                .collect();
            let pending_ids: HashSet<SubtaskId> = subtasks
                .iter()
                .filter(|s| s.is_pending())
                .map(|s| s.id().clone())
                .collect();

            let ready = graph.ready_ids(&completed_ids, &pending_ids);
            if ready.is_empty() {
                for (id, unmet) in graph.stuck_report(&completed_ids, &pending_ids) {
                    let unmet: Vec<&str> = unmet.iter().map(|d| d.as_str()).collect();
                    mlog_warn!(
                        "Run {} subtask {} is stuck, unmet dependencies: [{}]",
                        run_id,
                        id,
                        unmet.join(", ")
                    );
                }
                if graph.is_cyclic() {
                    mlog_warn!("Run {} dependency graph contains a cycle", run_id);
                }
                self.emit(RunEvent::Stalled {
                    iteration: iterations,
                    pending: pending_ids.len(),
                });
                break;
            }

            mlog!(
                "Run {} iteration {}: dispatching batch of {}",
                run_id,
                iterations,
                ready.len()
            );
            self.emit(RunEvent::BatchDispatched {
                iteration: iterations,
                ids: ready.clone(),
            });

            let backoff = self.config.retry_backoff();
            let memory = self.memory.as_deref();
            let batch = ready
                .iter()
                .map(|id| execute_subtask(subtasks[index[id]].clone(), &self.registry, memory, backoff));
            // Barrier: the whole batch finishes before the next ready-set pass
            let finished = join_all(batch).await;

            for record in finished {
                match &record.status {
                    SubtaskStatus::Completed => self.emit(RunEvent::SubtaskCompleted {
                        id: record.id().clone(),
                    }),
                    SubtaskStatus::Failed { error } => self.emit(RunEvent::SubtaskFailed {
                        id: record.id().clone(),
                        error: error.clone(),
                    }),
                    _ => {}
                }
                let slot = index[record.id()];
                subtasks[slot] = record;
            }
        }

        let result = self.summarize(run_id, task, subtasks, iterations, started_at);
        mlog!(
            "Run {} finished: success={}, completed={}/{}, failed={}, iterations={}",
            run_id,
            result.success,
            result.completed,
            result.subtask_count,
            result.failed,
            result.iterations
        );
        self.emit(RunEvent::RunFinished {
            run_id,
            success: result.success,
        });
        self.history.push(result.clone());
        result
    }

    /// Produce the run plan: decomposer output when valid, keyword fallback
    /// otherwise.
    async fn plan(&self, task: &str, worker_types: &[String]) -> (Vec<SubtaskSpec>, SubtaskGraph) {
        if let Some(decomposer) = &self.decomposer {
            match decomposer.decompose(task, worker_types).await {
                Ok(specs) if !specs.is_empty() => match SubtaskGraph::from_specs(&specs) {
                    Ok(graph) => return (specs, graph),
                    Err(e) => {
                        mlog_warn!("Decomposition plan rejected, using fallback: {}", e);
                    }
                },
                Ok(_) => {
                    mlog_warn!("Decomposition returned an empty plan, using fallback");
                }
                Err(e) => {
                    mlog_warn!("Decomposition failed, using fallback: {}", e);
                }
            }
        }

        let specs = fallback_decompose(task, worker_types);
        // Fallback ids are sequential, so the graph build cannot reject them
        match SubtaskGraph::from_specs(&specs) {
            Ok(graph) => (specs, graph),
            Err(_) => (Vec::new(), SubtaskGraph::default()),
        }
    }

    fn summarize(
        &self,
        run_id: Uuid,
        task: &str,
        subtasks: Vec<Subtask>,
        iterations: u32,
        started_at: DateTime<Utc>,
    ) -> OrchestrationResult {
        let subtask_count = subtasks.len();
        let completed = subtasks.iter().filter(|s| s.is_completed()).count();
        let failed = subtasks
            .iter()
            .filter(|s| matches!(s.status, SubtaskStatus::Failed { .. }))
            .count();
        let success = subtask_count > 0 && completed == subtask_count;

        let final_output = subtasks
            .iter()
            .filter_map(|s| {
                s.result.as_ref().map(|result| {
                    format!("{} ({}):\n{}", s.id(), s.spec.worker_type, result)
                })
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        if success {
            if let Some(memory) = &self.memory {
                memory.store_fact(
                    &format!("Successfully orchestrated: {}", task),
                    0.95,
                    "orchestrator",
                );
            }
        }

        OrchestrationResult {
            run_id,
            task: task.to_string(),
            subtask_count,
            completed,
            failed,
            iterations,
            success,
            final_output,
            subtasks,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .field("runs", &self.history.len())
            .finish()
    }
}
