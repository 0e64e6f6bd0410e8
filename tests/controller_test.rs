//! End-to-end tests of the repair loop against scripted collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use mender::adapters::substrates::{ExecutorStep, GeneratorStep, ScriptedExecutor, ScriptedGenerator};
use mender::domain::models::{AbortReason, AttemptKind, FailureSignature, GuardMode, RunPolicy, RunStatus};
use async_trait::async_trait;
use mender::domain::ports::{ExecutionResult, Executor, ExecutorError, Generator};
use mender::services::{Controller, ControllerConfig, MemoryStore};
use tokio_util::sync::CancellationToken;

use common::{harness, harness_with_memory, setup_test_logging};

const NAME_ERROR: &str = "Traceback (most recent call last):\nNameError: name 'totl' is not defined";

fn short_timeouts() -> ControllerConfig {
    ControllerConfig {
        generation_timeout: Duration::from_millis(200),
        execution_timeout: Duration::from_millis(200),
        ..ControllerConfig::default()
    }
}

#[tokio::test]
async fn test_always_failing_executor_exhausts_budget() {
    setup_test_logging();
    let h = harness(
        ScriptedGenerator::new(["a = 1", "b = 2", "c = 3"]),
        ScriptedExecutor::always_fail(NAME_ERROR),
    );

    let outcome = h.controller.run("compute the total", &RunPolicy::new(3)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Exhausted);
    assert_eq!(outcome.attempt_history.len(), 3);
    assert!(outcome.final_code.is_none());
    assert!(outcome.abort_reason.is_none());
    assert_eq!(h.executor.calls(), 3);
    assert_eq!(outcome.failures_seen.len(), 1, "one distinct signature");

    let iterations: Vec<u32> = outcome.attempt_history.iter().map(|a| a.iteration).collect();
    assert_eq!(iterations, vec![1, 2, 3]);

    // Every failed iteration lands in the ledger, the exhausting one without a fix
    let records = h.memory.recall_failures(&outcome.failures_seen[0]).await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].occurrence_count, 3);
    assert!(records[0].fix.is_some());
    assert!(records[2].fix.is_none());
}

#[tokio::test]
async fn test_second_candidate_passes() {
    let h = harness(
        ScriptedGenerator::new(["def f(): return 1", "def f(): return 2"]),
        ScriptedExecutor::pass_on(2),
    );

    let outcome = h.controller.run("fix f", &RunPolicy::new(5)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.attempt_history.len(), 2);
    assert_eq!(outcome.final_code.as_deref(), Some("def f(): return 2"));
    assert!(!outcome.attempt_history[0].passed);
    assert!(outcome.attempt_history[1].passed);
    assert_eq!(h.generator.calls(), 2);
}

#[tokio::test]
async fn test_suggested_fix_reaches_next_plan() {
    let h = harness(
        ScriptedGenerator::new(["print(totl)", "print(total)"]),
        ScriptedExecutor::new(vec![
            ExecutorStep::Fail(NAME_ERROR.to_string()),
            ExecutorStep::Pass("ok".to_string()),
        ]),
    );

    h.controller.run("print the total", &RunPolicy::new(3)).await.unwrap();

    let plans = h.generator.plans().await;
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].iteration, 1);
    assert!(plans[0].last_reflection.is_none());
    assert!(plans[0].recent_attempts.is_empty());

    let second = &plans[1];
    assert_eq!(second.iteration, 2);
    let reflection = second.last_reflection.as_ref().expect("reflection in plan");
    assert!(!reflection.suggested_fix.is_empty());
    assert_eq!(second.recent_attempts.len(), 1);
    assert!(!second.related_failures.is_empty());
    assert!(second.last_analysis.is_some());
}

#[tokio::test]
async fn test_block_mode_veto_skips_executor() {
    let memory = Arc::new(MemoryStore::new());
    let sig = FailureSignature::new("AttributeError: object has no attribute <*>");
    memory
        .store_failure(sig, "xs.push(1)", "AttributeError: 'list' object has no attribute 'push'", None)
        .await
        .unwrap();

    let h = harness_with_memory(
        ScriptedGenerator::new(["xs.push(1)", "xs.append(1)"]),
        ScriptedExecutor::always_pass(),
        memory,
    );
    let policy = RunPolicy::new(3).with_guard_mode(GuardMode::Block);
    let outcome = h.controller.run("append to list", &policy).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.attempt_history.len(), 2);
    assert_eq!(outcome.attempt_history[0].kind, AttemptKind::Vetoed);
    assert_eq!(h.executor.calls(), 1, "vetoed candidate never executed");
    assert_eq!(h.executor.executed().await, vec!["xs.append(1)".to_string()]);

    let plans = h.generator.plans().await;
    assert!(!plans[1].guard_warnings.is_empty());
}

#[tokio::test]
async fn test_warn_mode_still_validates() {
    let memory = Arc::new(MemoryStore::new());
    memory
        .store_failure(
            FailureSignature::new("AttributeError: object has no attribute <*>"),
            "xs.push(1)",
            "AttributeError: 'list' object has no attribute 'push'",
            None,
        )
        .await
        .unwrap();

    let h = harness_with_memory(
        ScriptedGenerator::repeating("xs.push(1)"),
        ScriptedExecutor::always_pass(),
        memory,
    );
    let outcome = h.controller.run("append to list", &RunPolicy::new(2)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(h.executor.calls(), 1);
}

#[tokio::test]
async fn test_block_veto_on_last_iteration_exhausts() {
    let memory = Arc::new(MemoryStore::new());
    memory
        .store_failure(FailureSignature::new("SyntaxError"), "bad code", "SyntaxError", None)
        .await
        .unwrap();

    let h = harness_with_memory(
        ScriptedGenerator::repeating("bad   code"),
        ScriptedExecutor::always_pass(),
        memory,
    );
    let policy = RunPolicy::new(2).with_guard_mode(GuardMode::Block);
    let outcome = h.controller.run("anything", &policy).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Exhausted);
    assert_eq!(outcome.attempt_history.len(), 2);
    assert!(outcome.attempt_history.iter().all(|a| a.kind == AttemptKind::Vetoed));
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn test_unavailable_generator_aborts_without_attempts() {
    let h = harness(
        ScriptedGenerator::unavailable("connection refused"),
        ScriptedExecutor::always_pass(),
    );

    let outcome = h.controller.run("goal", &RunPolicy::new(3)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Aborted);
    assert!(outcome.attempt_history.is_empty());
    assert!(matches!(outcome.abort_reason, Some(AbortReason::Infrastructure { .. })));
    assert_eq!(h.memory.stats().await.total_failures, 0);
}

#[tokio::test]
async fn test_executor_error_aborts_after_earlier_failures() {
    let h = harness(
        ScriptedGenerator::new(["one", "two"]),
        ScriptedExecutor::new(vec![
            ExecutorStep::Fail("ValueError: bad value 3".to_string()),
            ExecutorStep::Error("sandbox crashed".to_string()),
        ]),
    );

    let outcome = h.controller.run("goal", &RunPolicy::new(5)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Aborted);
    assert_eq!(outcome.attempt_history.len(), 1, "aborting attempt is not recorded");
    assert_eq!(outcome.failures_seen.len(), 1);
    match outcome.abort_reason {
        Some(AbortReason::Infrastructure { message }) => assert!(message.contains("sandbox crashed")),
        other => panic!("expected infrastructure abort, got {other:?}"),
    }
}

#[tokio::test]
async fn test_executor_timeout_is_an_ordinary_failure() {
    let h = harness(
        ScriptedGenerator::new(["while True: pass", "print(1)"]),
        ScriptedExecutor::new(vec![ExecutorStep::TimedOut, ExecutorStep::Pass("1".to_string())]),
    );

    let outcome = h.controller.run("print one", &RunPolicy::new(3)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.attempt_history[0].kind, AttemptKind::TimedOut);
    assert_eq!(outcome.failures_seen, vec![FailureSignature::timeout()]);
    assert_eq!(h.memory.recall_failures(&FailureSignature::timeout()).await.len(), 1);
}

#[tokio::test]
async fn test_hanging_executor_hits_controller_timeout() {
    let h = harness(
        ScriptedGenerator::repeating("loop forever"),
        ScriptedExecutor::new(vec![ExecutorStep::Hang, ExecutorStep::Pass("ok".to_string())]),
    );
    let controller = h.controller.with_config(short_timeouts());

    let outcome = controller.run("goal", &RunPolicy::new(2)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.attempt_history[0].kind, AttemptKind::TimedOut);
    assert_eq!(outcome.attempt_history[0].signature, Some(FailureSignature::timeout()));
}

#[tokio::test]
async fn test_hanging_generator_times_out_and_retries() {
    let h = harness(
        ScriptedGenerator::from_steps(vec![
            GeneratorStep::Hang,
            GeneratorStep::Candidate("print(1)".to_string()),
        ]),
        ScriptedExecutor::always_pass(),
    );
    let memory = Arc::clone(&h.memory);
    let controller = h.controller.with_config(short_timeouts());

    let outcome = controller.run("goal", &RunPolicy::new(2)).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    assert_eq!(outcome.attempt_history.len(), 2);
    assert_eq!(outcome.attempt_history[0].kind, AttemptKind::TimedOut);
    assert!(outcome.attempt_history[0].candidate_code.is_empty());
    assert_eq!(memory.stats().await.total_failures, 0, "generation timeouts stay out of the ledger");
}

#[tokio::test]
async fn test_cancel_interrupts_in_flight_generation() {
    let h = harness(
        ScriptedGenerator::from_steps(vec![GeneratorStep::Hang]),
        ScriptedExecutor::always_pass(),
    );
    let token = CancellationToken::new();

    let cancel = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };
    let outcome = h
        .controller
        .run_with_cancel("goal", &RunPolicy::new(3), token)
        .await
        .unwrap();
    cancel.await.unwrap();

    assert_eq!(outcome.status, RunStatus::Aborted);
    assert_eq!(outcome.abort_reason, Some(AbortReason::Cancelled));
    assert!(outcome.attempt_history.is_empty());
}

#[tokio::test]
async fn test_cancel_during_validation_keeps_earlier_work() {
    setup_test_logging();
    let h = harness(
        ScriptedGenerator::new(["print(totl)", "print(total)"]),
        ScriptedExecutor::new(vec![
            ExecutorStep::Fail(NAME_ERROR.to_string()),
            ExecutorStep::Hang,
        ]),
    );
    let memory = Arc::clone(&h.memory);
    let token = CancellationToken::new();

    let cancel = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        })
    };
    let outcome = h
        .controller
        .run_with_cancel("goal", &RunPolicy::new(5), token)
        .await
        .unwrap();
    cancel.await.unwrap();

    assert_eq!(outcome.status, RunStatus::Aborted);
    assert_eq!(outcome.abort_reason, Some(AbortReason::Cancelled));
    assert_eq!(h.executor.calls(), 2, "the second candidate was being validated");
    assert_eq!(outcome.attempt_history.len(), 1, "the interrupted attempt is not recorded");
    assert_eq!(outcome.attempt_history[0].candidate_code, "print(totl)");
    assert!(!outcome.attempt_history[0].passed);
    assert!(outcome.final_code.is_none());

    let ledger = memory.ledger_snapshot().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].1.len(), 1);
    assert_eq!(ledger[0].1[0].failed_code, "print(totl)");
    assert!(ledger[0].1[0].fix.is_some(), "the reflected fix survives cancellation");
}

/// Fails every candidate and requests cancellation while doing so.
struct CancellingExecutor {
    token: CancellationToken,
}

#[async_trait]
impl Executor for CancellingExecutor {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn run(&self, _candidate_code: &str) -> Result<ExecutionResult, ExecutorError> {
        self.token.cancel();
        Ok(ExecutionResult::failed(NAME_ERROR))
    }
}

#[tokio::test]
async fn test_cancel_between_iterations_stops_at_planning() {
    let token = CancellationToken::new();
    let generator = Arc::new(ScriptedGenerator::repeating("print(totl)"));
    let memory = Arc::new(MemoryStore::new());
    let controller = Controller::new(
        Arc::clone(&generator) as Arc<dyn Generator>,
        Arc::new(CancellingExecutor {
            token: token.clone(),
        }),
        Arc::clone(&memory),
    );

    let outcome = controller
        .run_with_cancel("goal", &RunPolicy::new(5), token)
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Aborted);
    assert_eq!(outcome.abort_reason, Some(AbortReason::Cancelled));
    assert_eq!(generator.calls(), 1, "no generation after cancellation");
    assert_eq!(outcome.attempt_history.len(), 1, "the completed attempt is kept");
    assert_eq!(outcome.failures_seen.len(), 1);

    let stats = memory.stats().await;
    assert_eq!(stats.total_failures, 1, "the completed failure was learned before stopping");
}

#[tokio::test]
async fn test_short_term_capacity_bounds_plan_history() {
    let h = harness(
        ScriptedGenerator::new(["a", "b", "c", "d", "e"]),
        ScriptedExecutor::always_fail("RuntimeError: boom"),
    );
    let policy = RunPolicy::new(5).with_short_term_capacity(2);

    let outcome = h.controller.run("goal", &policy).await.unwrap();
    assert_eq!(outcome.attempt_history.len(), 5, "history is not bounded by the buffer");

    let plans = h.generator.plans().await;
    let last = plans.last().unwrap();
    let codes: Vec<&str> = last.recent_attempts.iter().map(|a| a.candidate_code.as_str()).collect();
    assert_eq!(codes, vec!["c", "d"]);
}

#[tokio::test]
async fn test_cached_solution_is_offered_to_next_run() {
    let memory = Arc::new(MemoryStore::new());

    let first = harness_with_memory(
        ScriptedGenerator::repeating("sorted(xs)"),
        ScriptedExecutor::always_pass(),
        Arc::clone(&memory),
    );
    first.controller.run("Sort a list", &RunPolicy::new(2)).await.unwrap();

    let second = harness_with_memory(
        ScriptedGenerator::repeating("sorted(xs)"),
        ScriptedExecutor::always_pass(),
        Arc::clone(&memory),
    );
    second.controller.run("sort   a LIST", &RunPolicy::new(2)).await.unwrap();

    let plans = second.generator.plans().await;
    let cached = plans[0].cached_solution.as_ref().expect("cached solution");
    assert_eq!(cached.solution, "sorted(xs)");
    assert!((cached.success_rate - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_concurrent_runs_share_the_ledger() {
    let memory = Arc::new(MemoryStore::new());
    let h = harness_with_memory(
        ScriptedGenerator::repeating("x = undefined_name"),
        ScriptedExecutor::always_fail("NameError: name 'undefined_name' is not defined"),
        Arc::clone(&memory),
    );
    let controller = Arc::new(h.controller);

    let runs = (0..4).map(|i| {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run(&format!("goal {i}"), &RunPolicy::new(2)).await })
    });
    let outcomes = futures::future::join_all(runs).await;

    for outcome in outcomes {
        let outcome = outcome.unwrap().unwrap();
        assert_eq!(outcome.status, RunStatus::Exhausted);
    }

    let stats = memory.stats().await;
    assert_eq!(stats.distinct_signatures, 1);
    assert_eq!(stats.total_failures, 8);
    assert_eq!(stats.top_signatures[0].1, 8);
}
