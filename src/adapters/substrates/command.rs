//! Generator backed by an external command.
//!
//! The command receives a JSON [`GenerationRequest`] on stdin and prints the
//! candidate on stdout. Any model client can be plugged in this way.

use async_trait::async_trait;
use serde::Serialize;
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::domain::models::{GeneratorConfig, Plan};
use crate::domain::ports::{Generator, GeneratorError};

/// Payload written to the generator command's stdin.
#[derive(Debug, Serialize)]
pub struct GenerationRequest<'a> {
    pub goal: &'a str,
    pub plan: &'a Plan,
}

/// Spawns the configured command once per generation.
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from configuration; `None` when no command is configured.
    pub fn from_config(config: &GeneratorConfig) -> Option<Self> {
        if config.command.trim().is_empty() {
            return None;
        }
        Some(Self::new(config.command.clone(), config.args.clone()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Generator for CommandGenerator {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(skip(self, plan), fields(program = %self.program, iteration = plan.iteration))]
    async fn generate(&self, goal: &str, plan: &Plan) -> Result<String, GeneratorError> {
        let payload = serde_json::to_vec(&GenerationRequest { goal, plan })
            .map_err(|e| GeneratorError::Unavailable(format!("Failed to encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                GeneratorError::Unavailable(format!("Failed to spawn {}: {e}", self.program))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| GeneratorError::Unavailable("Failed to capture stdin".to_string()))?;

        // Written while stdout drains; the child may answer before reading it all.
        let write_request = async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(write_request, child.wait_with_output());

        let output = output
            .map_err(|e| GeneratorError::Unavailable(format!("Generator process failed: {e}")))?;
        match written {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("generator closed stdin before reading the whole request");
            }
            Err(e) => {
                return Err(GeneratorError::Unavailable(format!(
                    "Failed to write request: {e}"
                )));
            }
            Ok(()) => {}
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GeneratorError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let candidate = String::from_utf8_lossy(&output.stdout).into_owned();
        if candidate.trim().is_empty() {
            return Err(GeneratorError::Unavailable(format!(
                "{} produced no candidate",
                self.program
            )));
        }

        debug!(bytes = candidate.len(), "candidate generated");
        Ok(candidate)
    }
}
