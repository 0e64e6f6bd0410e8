//! Scripted generator and executor for tests and dry runs.
//!
//! Both replay a fixed script, one step per call, and repeat the last step
//! once the script is used up.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::models::Plan;
use crate::domain::ports::{
    ExecutionResult, Executor, ExecutorError, Generator, GeneratorError,
};

/// Long enough to trip any per-call timeout used in tests.
const HANG: Duration = Duration::from_secs(3600);

/// One scripted generator response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorStep {
    Candidate(String),
    Unavailable(String),
    /// Never returns within a reasonable timeout
    Hang,
}

/// Generator replaying a script of candidates.
pub struct ScriptedGenerator {
    steps: Vec<GeneratorStep>,
    calls: AtomicUsize,
    plans: Mutex<Vec<Plan>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_steps(
            candidates
                .into_iter()
                .map(|c| GeneratorStep::Candidate(c.into()))
                .collect(),
        )
    }

    pub fn from_steps(steps: Vec<GeneratorStep>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
            plans: Mutex::new(Vec::new()),
        }
    }

    /// Always returns `candidate`.
    pub fn repeating(candidate: impl Into<String>) -> Self {
        Self::new([candidate.into()])
    }

    /// Always fails with GENERATION_UNAVAILABLE.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::from_steps(vec![GeneratorStep::Unavailable(message.into())])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Plans received so far, in call order.
    pub async fn plans(&self) -> Vec<Plan> {
        self.plans.lock().await.clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _goal: &str, plan: &Plan) -> Result<String, GeneratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.plans.lock().await.push(plan.clone());

        match step_at(&self.steps, call) {
            Some(GeneratorStep::Candidate(code)) => Ok(code.clone()),
            Some(GeneratorStep::Unavailable(message)) => {
                Err(GeneratorError::Unavailable(message.clone()))
            }
            Some(GeneratorStep::Hang) => {
                tokio::time::sleep(HANG).await;
                Err(GeneratorError::Unavailable("scripted generator hung".to_string()))
            }
            None => Err(GeneratorError::Unavailable("empty script".to_string())),
        }
    }
}

/// One scripted executor response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorStep {
    Pass(String),
    Fail(String),
    /// Reports its own timeout
    TimedOut,
    /// Executor infrastructure failure
    Error(String),
    /// Never returns within a reasonable timeout
    Hang,
}

/// Executor replaying a script of verdicts.
pub struct ScriptedExecutor {
    steps: Vec<ExecutorStep>,
    calls: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new(steps: Vec<ExecutorStep>) -> Self {
        Self {
            steps,
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn always_pass() -> Self {
        Self::new(vec![ExecutorStep::Pass("ok".to_string())])
    }

    pub fn always_fail(output: impl Into<String>) -> Self {
        Self::new(vec![ExecutorStep::Fail(output.into())])
    }

    /// Fails every call before the `call`-th (1-based), then passes.
    pub fn pass_on(call: usize) -> Self {
        let mut steps: Vec<ExecutorStep> = (1..call)
            .map(|i| ExecutorStep::Fail(format!("AssertionError: expected {i} but got {}", i + 1)))
            .collect();
        steps.push(ExecutorStep::Pass("ok".to_string()));
        Self::new(steps)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Candidates received so far, in call order.
    pub async fn executed(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, candidate_code: &str) -> Result<ExecutionResult, ExecutorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().await.push(candidate_code.to_string());

        match step_at(&self.steps, call) {
            Some(ExecutorStep::Pass(output)) => Ok(ExecutionResult::passed(output.clone())),
            Some(ExecutorStep::Fail(output)) => Ok(ExecutionResult::failed(output.clone())),
            Some(ExecutorStep::TimedOut) => Err(ExecutorError::Timeout(Duration::ZERO)),
            Some(ExecutorStep::Error(message)) => Err(ExecutorError::Failed(message.clone())),
            Some(ExecutorStep::Hang) => {
                tokio::time::sleep(HANG).await;
                Err(ExecutorError::Failed("scripted executor hung".to_string()))
            }
            None => Err(ExecutorError::Failed("empty script".to_string())),
        }
    }
}

fn step_at<T>(steps: &[T], call: usize) -> Option<&T> {
    steps.get(call).or_else(|| steps.last())
}
