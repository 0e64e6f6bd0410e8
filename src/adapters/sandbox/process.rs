//! Executor running candidates as local processes.
//!
//! The candidate is written to a fresh file in the work directory and the
//! configured interpreter or test runner is invoked with its path appended to
//! the arguments. Exit status zero means the candidate passed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::models::ExecutorConfig;
use crate::domain::ports::{ExecutionResult, Executor, ExecutorError};

/// Runs candidates with a configured program under a hard time limit.
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
    file_extension: String,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            file_extension: "py".to_string(),
            work_dir: work_dir.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(
            config.command.clone(),
            config.args.clone(),
            &config.work_dir,
            Duration::from_secs(config.timeout_secs),
        )
        .with_extension(config.file_extension.clone())
    }

    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    fn candidate_path(&self) -> PathBuf {
        let name = if self.file_extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), self.file_extension)
        };
        self.work_dir.join(name)
    }

    async fn execute(&self, path: &Path) -> Result<ExecutionResult, ExecutorError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutorError::Failed(format!("Failed to spawn {}: {e}", self.program)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result
                .map_err(|e| ExecutorError::Failed(format!("Failed to wait for {}: {e}", self.program)))?,
            Err(_) => return Err(ExecutorError::Timeout(self.timeout)),
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        debug!(status = %output.status, bytes = combined.len(), "candidate executed");

        if output.status.success() {
            Ok(ExecutionResult::passed(combined))
        } else {
            Ok(ExecutionResult::failed(combined))
        }
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(skip(self, candidate_code), fields(program = %self.program))]
    async fn run(&self, candidate_code: &str) -> Result<ExecutionResult, ExecutorError> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| ExecutorError::Failed(format!("Failed to create work directory: {e}")))?;

        let path = self.candidate_path();
        tokio::fs::write(&path, candidate_code)
            .await
            .map_err(|e| ExecutorError::Failed(format!("Failed to write candidate: {e}")))?;

        let result = self.execute(&path).await;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "failed to remove candidate file");
        }

        result
    }
}
