//! Implementation of the `mender run` command.

use anyhow::{bail, Context, Result};
use clap::Args;
use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::sandbox::ProcessExecutor;
use crate::adapters::substrates::CommandGenerator;
use crate::cli::open_memory;
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::cli::{MultiProgressManager, ProgressBarExt};
use crate::domain::models::{Config, GuardMode, RunOutcome, RunPolicy, RunStatus};
use crate::services::{Controller, ControllerConfig, PatternExtractor, ReflectionEngine};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Goals to repair; several goals run concurrently against shared memory
    #[arg(required = true, num_args = 1..)]
    pub goals: Vec<String>,

    /// Iteration budget per goal (defaults to controller.max_iterations)
    #[arg(short, long)]
    pub max_iterations: Option<u32>,

    /// Mistake guard mode: warn or block (defaults to controller.guard_mode)
    #[arg(short, long)]
    pub guard_mode: Option<String>,

    /// Short-term buffer capacity (defaults to controller.short_term_capacity)
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Solution cache key; derived from each goal when absent
    #[arg(long)]
    pub problem_type: Option<String>,

    /// Print the passing candidate of each successful run
    #[arg(long)]
    pub show_code: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct RunReport {
    pub outcomes: Vec<RunOutcome>,
    #[serde(skip)]
    pub show_code: bool,
}

impl RunReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(RunOutcome::is_success)
    }
}

impl CommandOutput for RunReport {
    fn to_human(&self) -> String {
        let rows: Vec<_> = self
            .outcomes
            .iter()
            .map(|o| {
                (
                    o.goal.clone(),
                    o.status,
                    o.iterations_used(),
                    o.failures_seen.len(),
                )
            })
            .collect();
        let mut lines = vec![TableFormatter::new().format_runs(&rows)];

        for outcome in &self.outcomes {
            if let Some(reason) = &outcome.abort_reason {
                lines.push(format!("{}: aborted ({reason})", outcome.goal));
            }
            if !outcome.failures_seen.is_empty() {
                lines.push(format!("{}: failures seen", outcome.goal));
                for signature in &outcome.failures_seen {
                    lines.push(format!("  - {signature}"));
                }
            }
            if self.show_code {
                if let Some(code) = &outcome.final_code {
                    lines.push(format!("\n--- {} ---\n{code}", outcome.goal));
                }
            }
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Merge command-line overrides over the configured controller defaults.
pub fn build_policy(args: &RunArgs, config: &Config) -> Result<RunPolicy> {
    let mode_name = args
        .guard_mode
        .as_deref()
        .unwrap_or(&config.controller.guard_mode);
    let guard_mode = GuardMode::from_str(mode_name)
        .with_context(|| format!("Invalid guard mode: {mode_name}. Must be one of: warn, block"))?;

    let mut policy = RunPolicy::new(args.max_iterations.unwrap_or(config.controller.max_iterations))
        .with_guard_mode(guard_mode)
        .with_short_term_capacity(args.capacity.unwrap_or(config.controller.short_term_capacity));
    if let Some(problem_type) = &args.problem_type {
        policy = policy.with_problem_type(problem_type.clone());
    }

    policy.validate().map_err(anyhow::Error::msg)?;
    Ok(policy)
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let policy = build_policy(&args, config)?;

    let generator = CommandGenerator::from_config(&config.generator)
        .context("No generator configured. Set generator.command in .mender/config.yaml")?;
    let executor = ProcessExecutor::from_config(&config.executor);
    let memory = open_memory(config).await?;

    let controller = Arc::new(
        Controller::new(Arc::new(generator), Arc::new(executor), memory)
            .with_config(ControllerConfig::from_config(config))
            .with_reflection_engine(ReflectionEngine::new(PatternExtractor::new(
                config.memory.signature_max_len,
            ))),
    );

    let cancellation_token = CancellationToken::new();
    let interrupt = cancellation_token.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling runs");
            interrupt.cancel();
        }
    });

    let progress = if json_mode {
        MultiProgressManager::hidden()
    } else {
        MultiProgressManager::new()
    };

    info!(goals = args.goals.len(), max_iterations = policy.max_iterations, "starting runs");

    let runs = args.goals.iter().map(|goal| {
        let controller = Arc::clone(&controller);
        let policy = &policy;
        let token = cancellation_token.child_token();
        let spinner = progress.add_spinner(goal.clone());
        async move {
            let result = controller.run_with_cancel(goal, policy, token).await;
            match &result {
                Ok(outcome) => match outcome.status {
                    RunStatus::Success => spinner.finish_success(format!(
                        "{goal} ({} iteration(s))",
                        outcome.iterations_used()
                    )),
                    RunStatus::Exhausted => spinner.finish_warning(format!("{goal} (exhausted)")),
                    RunStatus::Aborted => spinner.finish_error(format!("{goal} (aborted)")),
                },
                Err(e) => spinner.finish_error(format!("{goal}: {e}")),
            }
            result.with_context(|| format!("Run rejected for goal: {goal}"))
        }
    });

    let results = join_all(runs).await;
    ctrl_c.abort();

    let outcomes = results.into_iter().collect::<Result<Vec<_>>>()?;
    let report = RunReport {
        outcomes,
        show_code: args.show_code,
    };
    output(&report, json_mode);

    if !report.all_succeeded() {
        bail!("Not every goal was repaired");
    }
    Ok(())
}
