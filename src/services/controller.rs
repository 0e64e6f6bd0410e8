//! Repair loop controller.
//!
//! Drives one goal through plan, generate, validate and reflect until a
//! candidate passes or the iteration budget runs out. The controller owns a
//! run's [`WorkingMemory`] and writes what it learns into the shared
//! [`MemoryStore`].

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    AbortReason, Attempt, AttemptKind, Config, FailureRecord, FailureSignature, GuardMode, Plan,
    RunOutcome, RunPolicy, RunStatus,
};
use crate::domain::ports::{Executor, ExecutorError, Generator, GeneratorError};
use crate::services::code_analyzer::CodeAnalyzer;
use crate::services::memory_store::{MemoryStore, WorkingMemory};
use crate::services::mistake_guard::MistakeGuard;
use crate::services::reflection_engine::ReflectionEngine;

/// Input rejected before any iteration runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Goal cannot be empty")]
    EmptyGoal,

    #[error("Invalid run policy: {0}")]
    InvalidPolicy(String),
}

/// A collaborator failure that aborts the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InfrastructureError {
    #[error("Generator unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Executor error: {0}")]
    ExecutionError(String),

    #[error("Memory persistence failed: {0}")]
    Persistence(String),
}

impl From<DomainError> for InfrastructureError {
    fn from(err: DomainError) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Planning,
    Generating,
    Validating,
    Reflecting,
    DoneSuccess,
    DoneExhausted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planning => "PLANNING",
            Self::Generating => "GENERATING",
            Self::Validating => "VALIDATING",
            Self::Reflecting => "REFLECTING",
            Self::DoneSuccess => "DONE_SUCCESS",
            Self::DoneExhausted => "DONE_EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// Per-call limits and memory lookup tuning.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Upper bound on one generator call
    pub generation_timeout: Duration,
    /// Upper bound on one executor call
    pub execution_timeout: Duration,
    /// Minimum similarity for a ledger entry to be handed to the generator
    pub similarity_threshold: f64,
    /// Maximum number of similar failures handed to the generator
    pub related_failures_limit: usize,
}

impl ControllerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            generation_timeout: Duration::from_secs(config.controller.generation_timeout_secs),
            execution_timeout: Duration::from_secs(config.controller.execution_timeout_secs),
            similarity_threshold: config.memory.similarity_threshold,
            related_failures_limit: config.memory.related_failures_limit,
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A failed iteration waiting to be reflected on and learned from.
struct PendingFailure {
    code: String,
    error: String,
    signature: FailureSignature,
    /// Generation timeouts have no candidate and stay out of the ledger
    learnable: bool,
}

/// Bookkeeping for one run, turned into the [`RunOutcome`].
struct RunRecorder {
    run_id: Uuid,
    goal: String,
    working: WorkingMemory,
    history: Vec<Attempt>,
    failures_seen: Vec<FailureSignature>,
    started_at: chrono::DateTime<Utc>,
}

impl RunRecorder {
    fn new(goal: &str, working: WorkingMemory) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            goal: goal.to_string(),
            working,
            history: Vec::new(),
            failures_seen: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn record(&mut self, attempt: Attempt) {
        if let Some(signature) = &attempt.signature {
            if !self.failures_seen.contains(signature) {
                self.failures_seen.push(signature.clone());
            }
        }
        info!(
            run_id = %self.run_id,
            iteration = attempt.iteration,
            kind = attempt.kind.as_str(),
            passed = attempt.passed,
            signature = attempt.signature.as_ref().map(FailureSignature::as_str),
            "attempt recorded"
        );
        self.history.push(attempt.clone());
        self.working.record_attempt(attempt);
    }

    fn validated_attempts(&self) -> usize {
        self.history
            .iter()
            .filter(|a| a.kind == AttemptKind::Validated)
            .count()
    }

    fn finish(
        self,
        status: RunStatus,
        final_code: Option<String>,
        abort_reason: Option<AbortReason>,
    ) -> RunOutcome {
        RunOutcome {
            run_id: self.run_id,
            goal: self.goal,
            status,
            final_code,
            attempt_history: self.history,
            failures_seen: self.failures_seen,
            abort_reason,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    fn abort(self, reason: AbortReason) -> RunOutcome {
        match &reason {
            AbortReason::Cancelled => warn!(run_id = %self.run_id, "run cancelled"),
            AbortReason::Infrastructure { message } => {
                error!(run_id = %self.run_id, error = %message, "run aborted");
            }
        }
        self.finish(RunStatus::Aborted, None, Some(reason))
    }

    fn abort_infrastructure(self, err: InfrastructureError) -> RunOutcome {
        self.abort(AbortReason::Infrastructure {
            message: err.to_string(),
        })
    }
}

/// Orchestrates the repair loop for individual goals.
///
/// One controller may serve many concurrent runs; each run gets its own
/// short-term buffer while the failure ledger and solution cache are shared.
pub struct Controller {
    generator: Arc<dyn Generator>,
    executor: Arc<dyn Executor>,
    memory: Arc<MemoryStore>,
    reflection: ReflectionEngine,
    guard: MistakeGuard,
    analyzer: CodeAnalyzer,
    config: ControllerConfig,
}

impl Controller {
    pub fn new(
        generator: Arc<dyn Generator>,
        executor: Arc<dyn Executor>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            generator,
            executor,
            guard: MistakeGuard::new(Arc::clone(&memory)),
            memory,
            reflection: ReflectionEngine::default(),
            analyzer: CodeAnalyzer::new(),
            config: ControllerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_reflection_engine(mut self, reflection: ReflectionEngine) -> Self {
        self.reflection = reflection;
        self
    }

    #[must_use]
    pub fn with_mistake_guard(mut self, guard: MistakeGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    /// Run `goal` to completion.
    pub async fn run(&self, goal: &str, policy: &RunPolicy) -> Result<RunOutcome, ControllerError> {
        self.run_with_cancel(goal, policy, CancellationToken::new()).await
    }

    /// Run `goal`, stopping early when `cancel` is cancelled.
    ///
    /// Cancellation takes effect between iterations and interrupts an
    /// in-flight collaborator call; the interrupted attempt is not recorded.
    #[instrument(skip(self, policy, cancel), fields(max_iterations = policy.max_iterations, guard_mode = policy.guard_mode.as_str()))]
    pub async fn run_with_cancel(
        &self,
        goal: &str,
        policy: &RunPolicy,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, ControllerError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(ControllerError::EmptyGoal);
        }
        policy.validate().map_err(ControllerError::InvalidPolicy)?;

        let max_iterations = policy.max_iterations;
        let problem_type = problem_type_for(goal, policy);
        let cached = self.memory.lookup_solution(&problem_type).await;
        if let Some(solution) = &cached {
            debug!(problem_type = %problem_type, success_rate = solution.success_rate, "cached solution found");
        }

        let mut run = RunRecorder::new(
            goal,
            WorkingMemory::new(Arc::clone(&self.memory), policy.short_term_capacity),
        );
        info!(run_id = %run.run_id, problem_type = %problem_type, "run started");

        let mut plan = Plan::initial(goal, max_iterations, cached);
        let mut state = RunState::Planning;
        let mut iteration: u32 = 1;
        let mut candidate = String::new();
        let mut pending: Option<PendingFailure> = None;

        loop {
            match state {
                RunState::Planning => {
                    if cancel.is_cancelled() {
                        return Ok(run.abort(AbortReason::Cancelled));
                    }
                    plan.iteration = iteration;
                    plan.recent_attempts = run.working.recent_attempts();
                    transition(&mut state, RunState::Generating, iteration);
                }

                RunState::Generating => {
                    let generated = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Ok(run.abort(AbortReason::Cancelled)),
                        result = timeout(self.config.generation_timeout, self.generator.generate(goal, &plan)) => result,
                    };

                    let code = match generated {
                        Ok(Ok(code)) => code,
                        Ok(Err(GeneratorError::Unavailable(message))) => {
                            return Ok(run.abort_infrastructure(
                                InfrastructureError::GenerationUnavailable(message),
                            ));
                        }
                        Err(_) => {
                            warn!(iteration, generator = self.generator.name(), "generation timed out");
                            run.record(Attempt::timed_out(
                                iteration,
                                String::new(),
                                format!(
                                    "generation timed out after {:?}",
                                    self.config.generation_timeout
                                ),
                            ));
                            pending = Some(PendingFailure {
                                code: String::new(),
                                error: FailureSignature::TIMEOUT.to_string(),
                                signature: FailureSignature::timeout(),
                                learnable: false,
                            });
                            let next = self.after_failure(iteration, max_iterations, &mut pending).await;
                            match next {
                                Ok(next) => transition(&mut state, next, iteration),
                                Err(e) => return Ok(run.abort_infrastructure(e)),
                            }
                            continue;
                        }
                    };

                    let warnings = self.guard.check(&code).await;
                    for warning in &warnings {
                        warn!(iteration, warning = %warning, "mistake guard warning");
                    }

                    if policy.guard_mode == GuardMode::Block && !warnings.is_empty() {
                        let raw = warnings
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join("\n");
                        run.record(Attempt::vetoed(iteration, code, raw));
                        plan.guard_warnings = warnings;

                        if iteration >= max_iterations {
                            transition(&mut state, RunState::DoneExhausted, iteration);
                        } else {
                            iteration += 1;
                            transition(&mut state, RunState::Planning, iteration);
                        }
                        continue;
                    }

                    candidate = code;
                    transition(&mut state, RunState::Validating, iteration);
                }

                RunState::Validating => {
                    let executed = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Ok(run.abort(AbortReason::Cancelled)),
                        result = timeout(self.config.execution_timeout, self.executor.run(&candidate)) => result,
                    };

                    let failure = match executed {
                        Ok(Ok(result)) if result.passed => {
                            run.record(Attempt::validated(
                                iteration,
                                candidate.clone(),
                                result.output,
                                true,
                                None,
                            ));
                            transition(&mut state, RunState::DoneSuccess, iteration);
                            continue;
                        }
                        Ok(Ok(result)) => {
                            let signature = self.reflection.extractor().extract(&result.output);
                            run.record(Attempt::validated(
                                iteration,
                                candidate.clone(),
                                result.output.clone(),
                                false,
                                Some(signature.clone()),
                            ));
                            PendingFailure {
                                code: candidate.clone(),
                                error: result.output,
                                signature,
                                learnable: true,
                            }
                        }
                        Ok(Err(ExecutorError::Failed(message))) => {
                            return Ok(run.abort_infrastructure(InfrastructureError::ExecutionError(
                                message,
                            )));
                        }
                        Ok(Err(ExecutorError::Timeout(limit))) => {
                            warn!(iteration, executor = self.executor.name(), ?limit, "executor reported timeout");
                            self.timed_out_validation(&mut run, iteration, &candidate, limit)
                        }
                        Err(_) => {
                            warn!(iteration, executor = self.executor.name(), "validation timed out");
                            self.timed_out_validation(
                                &mut run,
                                iteration,
                                &candidate,
                                self.config.execution_timeout,
                            )
                        }
                    };

                    pending = Some(failure);
                    match self.after_failure(iteration, max_iterations, &mut pending).await {
                        Ok(next) => transition(&mut state, next, iteration),
                        Err(e) => return Ok(run.abort_infrastructure(e)),
                    }
                }

                RunState::Reflecting => {
                    let Some(failure) = pending.take() else {
                        iteration += 1;
                        transition(&mut state, RunState::Planning, iteration);
                        continue;
                    };

                    let mut reflection = self.reflection.reflect(&failure.code, &failure.error).await;
                    reflection.pattern = failure.signature.clone();
                    debug!(
                        iteration,
                        root_cause = %reflection.root_cause,
                        suggested_fix = %reflection.suggested_fix,
                        "reflected on failure"
                    );

                    if failure.learnable {
                        let stored = run
                            .working
                            .store()
                            .store_failure(
                                failure.signature.clone(),
                                &failure.code,
                                &failure.error,
                                Some(reflection.suggested_fix.clone()),
                            )
                            .await;
                        if let Err(e) = stored {
                            return Ok(run.abort_infrastructure(e.into()));
                        }
                    }

                    plan.related_failures = self.related_failures(&failure.signature).await;
                    plan.last_analysis = (!failure.code.trim().is_empty())
                        .then(|| self.analyzer.analyze(&failure.code));
                    plan.last_reflection = Some(reflection);
                    plan.guard_warnings.clear();

                    iteration += 1;
                    transition(&mut state, RunState::Planning, iteration);
                }

                RunState::DoneSuccess => {
                    let validated = run.validated_attempts().max(1);
                    let success_rate = 1.0 / validated as f64;
                    if let Err(e) = self
                        .memory
                        .store_solution(&problem_type, &candidate, success_rate)
                        .await
                    {
                        error!(problem_type = %problem_type, error = %e, "failed to cache solution");
                    }
                    info!(run_id = %run.run_id, iterations = iteration, "run succeeded");
                    return Ok(run.finish(RunStatus::Success, Some(candidate), None));
                }

                RunState::DoneExhausted => {
                    info!(run_id = %run.run_id, iterations = iteration, "iteration budget exhausted");
                    return Ok(run.finish(RunStatus::Exhausted, None, None));
                }
            }
        }
    }

    fn timed_out_validation(
        &self,
        run: &mut RunRecorder,
        iteration: u32,
        candidate: &str,
        limit: Duration,
    ) -> PendingFailure {
        run.record(Attempt::timed_out(
            iteration,
            candidate.to_string(),
            format!("validation timed out after {limit:?}"),
        ));
        PendingFailure {
            code: candidate.to_string(),
            error: FailureSignature::TIMEOUT.to_string(),
            signature: FailureSignature::timeout(),
            learnable: true,
        }
    }

    /// Decide where a failed iteration goes.
    ///
    /// The last iteration skips reflection; its failure is still written to
    /// the ledger without a fix.
    async fn after_failure(
        &self,
        iteration: u32,
        max_iterations: u32,
        pending: &mut Option<PendingFailure>,
    ) -> Result<RunState, InfrastructureError> {
        if iteration < max_iterations {
            return Ok(RunState::Reflecting);
        }

        if let Some(failure) = pending.take() {
            if failure.learnable {
                self.memory
                    .store_failure(failure.signature, &failure.code, &failure.error, None)
                    .await?;
            }
        }
        Ok(RunState::DoneExhausted)
    }

    /// Records for the exact signature followed by similar signatures.
    async fn related_failures(&self, signature: &FailureSignature) -> Vec<FailureRecord> {
        let mut related = self.memory.recall_failures(signature).await;
        related.extend(
            self.memory
                .similar_failures(
                    signature,
                    self.config.similarity_threshold,
                    self.config.related_failures_limit,
                )
                .await,
        );
        related
    }
}

fn transition(state: &mut RunState, next: RunState, iteration: u32) {
    debug!(from = %state, to = %next, iteration, "state transition");
    *state = next;
}

/// Solution cache key for a run.
pub fn problem_type_for(goal: &str, policy: &RunPolicy) -> String {
    match &policy.problem_type {
        Some(problem_type) => problem_type.trim().to_string(),
        None => goal
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase(),
    }
}
