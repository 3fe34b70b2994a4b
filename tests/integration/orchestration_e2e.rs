//! End-to-end orchestration tests: task text in, aggregated result out.

use std::sync::Arc;
use std::time::Duration;

use maestro::{
    Coordinator, InMemorySink, MemoryLevel, OrchestratorConfig, SubtaskId, SubtaskSpec, RunEvent,
};

use super::fixtures::{
    chain_plan, diamond_plan, fast_config, phase_registry, FailingWorker, FlakyWorker,
    PlanDecomposer, RecordingWorker, ScriptedWorker, SleepyWorker,
};

#[tokio::test]
async fn test_full_run_three_phases() {
    let mut coordinator = Coordinator::new(phase_registry()).with_config(fast_config());

    let result = coordinator
        .coordinate("Research the topic, analyze the data, and write a report")
        .await;

    assert!(result.success);
    assert_eq!(result.subtask_count, 3);
    assert_eq!(result.completed, 3);
    assert_eq!(result.failed, 0);
    assert!(result.subtasks.iter().all(|s| s.is_finished()));
    // One subtask per iteration: the fallback plan is strictly sequential
    assert_eq!(result.iterations, 3);
    assert_eq!(
        result.final_output,
        "task-1 (research):\nresearch output\n\n\
         task-2 (analysis):\nanalysis output\n\n\
         task-3 (writing):\nwriting output"
    );
}

#[tokio::test]
async fn test_fallback_plan_through_coordinator() {
    let mut coordinator = Coordinator::new(phase_registry()).with_config(fast_config());

    let result = coordinator.coordinate("Find sources and write a report").await;

    assert_eq!(result.subtask_count, 2);
    assert_eq!(result.subtasks[0].id(), &SubtaskId::new("task-1"));
    assert_eq!(result.subtasks[0].spec.worker_type, "research");
    assert!(result.subtasks[0].spec.dependencies.is_empty());
    assert_eq!(result.subtasks[1].id(), &SubtaskId::new("task-2"));
    assert_eq!(result.subtasks[1].spec.worker_type, "writing");
    assert_eq!(
        result.subtasks[1].spec.dependencies,
        vec![SubtaskId::new("task-1")]
    );
}

#[tokio::test]
async fn test_retry_then_success_accounting() {
    let mut registry = phase_registry();
    registry.register("flaky", FlakyWorker::new(2));
    let plan = vec![SubtaskSpec::new("task-1", "wobbly step", "flaky")];
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_config(fast_config());

    let result = coordinator.coordinate("run the wobbly step").await;

    assert!(result.success);
    assert_eq!(result.subtasks[0].retry_count, 2);
    assert_eq!(result.subtasks[0].result.as_deref(), Some("recovered"));
}

#[tokio::test]
async fn test_retry_exhaustion_accounting() {
    let mut registry = phase_registry();
    registry.register("bad", Arc::new(FailingWorker));
    let plan = vec![SubtaskSpec::new("task-1", "doomed step", "bad")];
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_config(fast_config());

    let result = coordinator.coordinate("run the doomed step").await;

    assert!(!result.success);
    assert_eq!(result.failed, 1);
    // max_retries of 2 means three attempts in total
    assert_eq!(result.subtasks[0].retry_count, 3);
    assert!(result.subtasks[0]
        .error()
        .unwrap()
        .contains("failed after 3 attempts"));
}

#[tokio::test]
async fn test_unregistered_worker_type_fails_without_attempts() {
    let plan = vec![SubtaskSpec::new("task-1", "orphan step", "nonexistent")];
    let mut coordinator = Coordinator::new(phase_registry())
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_config(fast_config());

    let result = coordinator.coordinate("run the orphan step").await;

    assert!(!result.success);
    assert_eq!(result.subtasks[0].retry_count, 0);
    assert!(result.subtasks[0].started_at.is_none());
    assert_eq!(
        result.subtasks[0].error(),
        Some("no worker registered for type: nonexistent")
    );
}

#[tokio::test]
async fn test_dangling_dependency_stalls_run() {
    let plan = vec![
        SubtaskSpec::new("task-1", "fine", "research"),
        SubtaskSpec::new("task-2", "stranded", "research")
            .with_dependencies(vec![SubtaskId::new("ghost")]),
    ];
    let mut coordinator = Coordinator::new(phase_registry())
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_config(fast_config());
    let mut events = coordinator.subscribe();

    let result = coordinator.coordinate("task with a bad reference").await;

    assert!(!result.success);
    assert_eq!(result.completed, 1);
    assert_eq!(result.failed, 0);
    assert!(result.subtasks[1].is_pending());

    let mut saw_stall = false;
    while let Ok(event) = events.try_recv() {
        if let RunEvent::Stalled { pending, .. } = event {
            saw_stall = true;
            assert_eq!(pending, 1);
        }
    }
    assert!(saw_stall);
}

#[tokio::test]
async fn test_failed_dependency_blocks_dependents() {
    let mut registry = phase_registry();
    registry.register("bad", Arc::new(FailingWorker));
    let plan = vec![
        SubtaskSpec::new("task-1", "doomed", "bad"),
        SubtaskSpec::new("task-2", "blocked", "research")
            .with_dependencies(vec![SubtaskId::new("task-1")]),
    ];
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_config(fast_config());

    let result = coordinator.coordinate("doomed then blocked").await;

    assert!(!result.success);
    assert_eq!(result.failed, 1);
    // The dependent never runs; it is stranded pending, not failed
    assert!(result.subtasks[1].is_pending());
}

#[tokio::test]
async fn test_diamond_executes_in_dependency_batches() {
    let (worker, log) = RecordingWorker::new();
    let mut registry = phase_registry();
    registry.register("general", worker);
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(diamond_plan("general"))))
        .with_config(fast_config());

    let result = coordinator.coordinate("diamond").await;

    assert!(result.success);
    assert_eq!(result.iterations, 3);

    let order = log.lock().unwrap().clone();
    assert_eq!(order.len(), 4);
    assert_eq!(order[0], "a work");
    assert_eq!(order[3], "d work");
    // b and c run in the middle batch, in either order
    assert!(order[1..3].contains(&"b work".to_string()));
    assert!(order[1..3].contains(&"c work".to_string()));
}

#[tokio::test]
async fn test_final_output_preserves_plan_order() {
    let mut registry = phase_registry();
    registry.register("sleepy", Arc::new(SleepyWorker));
    // task-1 finishes well after task-2, yet must appear first
    let plan = vec![
        SubtaskSpec::new("task-1", "sleep:80 slow step", "sleepy"),
        SubtaskSpec::new("task-2", "sleep:0 fast step", "sleepy"),
    ];
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_config(fast_config());

    let result = coordinator.coordinate("two independent steps").await;

    assert!(result.success);
    assert_eq!(result.iterations, 1);
    assert_eq!(
        result.final_output,
        "task-1 (sleepy):\ndone: sleep:80 slow step\n\n\
         task-2 (sleepy):\ndone: sleep:0 fast step"
    );
}

#[tokio::test]
async fn test_iteration_cap_strands_remaining_subtasks() {
    let mut registry = phase_registry();
    registry.register("general", ScriptedWorker::new("ok"));
    let cap = OrchestratorConfig::default().max_iterations as usize;
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(chain_plan(cap + 5, "general"))))
        .with_config(fast_config());

    let result = coordinator.coordinate("very long chain").await;

    assert!(!result.success);
    assert_eq!(result.iterations as usize, cap);
    assert_eq!(result.completed, cap);
    assert_eq!(result.failed, 0);
    assert_eq!(
        result.subtasks.iter().filter(|s| s.is_pending()).count(),
        5
    );
}

#[tokio::test]
async fn test_memory_side_effects_end_to_end() {
    let memory = Arc::new(InMemorySink::new());
    let mut registry = phase_registry().with_memory(memory.clone());
    registry.register("general", ScriptedWorker::new("the answer"));
    let plan = vec![SubtaskSpec::new("task-1", "compute", "general")];
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_memory(memory.clone())
        .with_config(fast_config());

    let result = coordinator.coordinate("compute the answer").await;
    assert!(result.success);

    // Registration events at long-term level
    let registered = memory.get("worker_general_registered").unwrap();
    assert_eq!(registered.level, MemoryLevel::LongTerm);

    // Plan snapshot at working level, keyed by run id
    let plan = memory
        .records()
        .into_iter()
        .find(|r| r.key.ends_with("_plan"))
        .unwrap();
    assert_eq!(plan.level, MemoryLevel::Working);
    assert_eq!(plan.value["task"], "compute the answer");
    assert_eq!(plan.value["subtasks"][0]["id"], "task-1");

    // Per-subtask result at working level
    let stored = memory.get("task_task-1_result").unwrap();
    assert_eq!(stored.level, MemoryLevel::Working);
    assert_eq!(stored.value, serde_json::json!("the answer"));

    // Success fact with fixed confidence and source
    let facts = memory.facts();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].text, "Successfully orchestrated: compute the answer");
    assert_eq!(facts[0].confidence, 0.95);
    assert_eq!(facts[0].source, "orchestrator");
}

#[tokio::test]
async fn test_failed_run_records_no_success_fact() {
    let memory = Arc::new(InMemorySink::new());
    let mut registry = phase_registry();
    registry.register("bad", Arc::new(FailingWorker));
    let plan = vec![SubtaskSpec::new("task-1", "doomed", "bad")];
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_memory(memory.clone())
        .with_config(fast_config());

    let result = coordinator.coordinate("doomed").await;

    assert!(!result.success);
    assert!(memory.facts().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_between_batches() {
    let mut registry = phase_registry();
    registry.register("sleepy", Arc::new(SleepyWorker));
    let plan = vec![
        SubtaskSpec::new("task-1", "sleep:150 first", "sleepy"),
        SubtaskSpec::new("task-2", "sleep:150 second", "sleepy")
            .with_dependencies(vec![SubtaskId::new("task-1")]),
        SubtaskSpec::new("task-3", "sleep:150 third", "sleepy")
            .with_dependencies(vec![SubtaskId::new("task-2")]),
    ];
    let mut coordinator = Coordinator::new(registry)
        .with_decomposer(Arc::new(PlanDecomposer(plan)))
        .with_config(fast_config());
    let token = coordinator.cancellation_token();

    let run = tokio::spawn(async move { coordinator.coordinate("slow chain").await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    let result = run.await.unwrap();

    assert!(!result.success);
    // The in-flight batch finished; nothing after it was dispatched
    assert_eq!(result.completed, 1);
    assert_eq!(result.iterations, 1);
    assert!(result.subtasks[2].is_pending());
}

#[tokio::test]
async fn test_history_accumulates_across_runs() {
    let mut coordinator = Coordinator::new(phase_registry()).with_config(fast_config());

    let first = coordinator.coordinate("research rust").await;
    let second = coordinator.coordinate("write the summary").await;

    assert_eq!(coordinator.history().len(), 2);
    assert_eq!(coordinator.history()[0].run_id, first.run_id);
    assert_eq!(coordinator.history()[1].run_id, second.run_id);
    assert_ne!(first.run_id, second.run_id);
}
