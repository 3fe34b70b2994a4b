//! Execution engine: drives one subtask record to a terminal state.
//!
//! Takes the record by value and returns it finished, so a batch of these
//! futures can run concurrently without shared mutable state. Retry policy
//! lives entirely here; workers just succeed or fail once per attempt.

use serde_json::json;
use std::time::Duration;

use crate::core::Subtask;
use crate::memory::{MemoryLevel, MemorySink};
use crate::worker::WorkerRegistry;
use crate::{mlog_debug, mlog_error, mlog_warn};

/// Execute one subtask against the registry, retrying failed attempts.
///
/// The record comes back terminal: completed, or failed with the reason.
/// `retry_count` on the returned record equals the number of failed attempts,
/// so an unregistered worker type shows zero (it never ran) and an exhausted
/// subtask shows `max_retries + 1`.
///
/// On success the worker's output is written to the memory sink under
/// `task_<id>_result` at working level.
pub async fn execute_subtask(
    mut subtask: Subtask,
    registry: &WorkerRegistry,
    memory: Option<&dyn MemorySink>,
    backoff: Duration,
) -> Subtask {
    let worker_type = subtask.spec.worker_type.clone();
    let worker = match registry.lookup(&worker_type) {
        Some(worker) => worker,
        None => {
            let error = format!("no worker registered for type: {}", worker_type);
            mlog_error!("Subtask {} not dispatched: {}", subtask.id(), error);
            subtask.fail(&error);
            return subtask;
        }
    };

    subtask.start();
    mlog_debug!(
        "Subtask {} dispatched to worker type {}",
        subtask.id(),
        worker_type
    );

    while subtask.retry_count <= subtask.max_retries {
        match worker.execute(&subtask.spec.description).await {
            Ok(output) => {
                if let Some(memory) = memory {
                    memory.store(
                        &format!("task_{}_result", subtask.id()),
                        json!(output.output),
                        MemoryLevel::Working,
                    );
                }
                subtask.complete(output.output);
                mlog_debug!(
                    "Subtask {} completed after {} failed attempt(s)",
                    subtask.id(),
                    subtask.retry_count
                );
                return subtask;
            }
            Err(e) => {
                subtask.retry_count += 1;
                if subtask.retry_count > subtask.max_retries {
                    let error = format!("failed after {} attempts: {}", subtask.retry_count, e);
                    mlog_error!("Subtask {} {}", subtask.id(), error);
                    subtask.fail(&error);
                    return subtask;
                }
                mlog_warn!(
                    "Subtask {} attempt {} failed, retrying: {}",
                    subtask.id(),
                    subtask.retry_count,
                    e
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }

    subtask
}
