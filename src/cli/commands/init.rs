//! Implementation of the `mender init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::{database_url, initialize_database};
use crate::cli::output::progress::{create_spinner, ProgressBarExt};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::PROJECT_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub directories_created: Vec<String>,
    pub config_written: bool,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.config_written {
            lines.push(format!("\nConfiguration written to {PROJECT_DIR}/config.yaml"));
        }
        if self.database_initialized {
            lines.push(format!("Database initialized at {PROJECT_DIR}/mender.db"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Default configuration for a freshly initialized project, with file logging enabled.
fn project_config() -> Config {
    let mut config = Config::default();
    config.logging.log_dir = Some(format!("{PROJECT_DIR}/logs"));
    config
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let project_dir = target_path.join(PROJECT_DIR);

    if project_dir.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            directories_created: vec![],
            config_written: false,
            database_initialized: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    if args.force && project_dir.exists() {
        fs::remove_dir_all(&project_dir)
            .await
            .with_context(|| format!("Failed to remove existing {PROJECT_DIR} directory"))?;
    }

    let mut directories_created = vec![];
    let dirs = [
        project_dir.clone(),
        project_dir.join("work"),
        project_dir.join("logs"),
    ];
    for dir in &dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let relative = dir
                .strip_prefix(&target_path)
                .unwrap_or(dir)
                .to_string_lossy()
                .to_string();
            directories_created.push(relative);
        }
    }

    let yaml = serde_yaml::to_string(&project_config()).context("Failed to serialize configuration")?;
    fs::write(project_dir.join("config.yaml"), yaml)
        .await
        .context("Failed to write config.yaml")?;

    let spinner = (!json_mode).then(|| create_spinner("Initializing database..."));
    let db_path = project_dir.join("mender.db");
    let initialized = initialize_database(&database_url(&db_path.to_string_lossy()), None).await;
    match initialized {
        Ok(pool) => {
            pool.close().await;
            if let Some(spinner) = &spinner {
                spinner.finish_success("Database ready");
            }
        }
        Err(e) => {
            if let Some(spinner) = &spinner {
                spinner.finish_error("Database initialization failed");
            }
            return Err(e).context("Failed to initialize database");
        }
    }

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        directories_created,
        config_written: true,
        database_initialized: true,
    };

    output(&output_data, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[tokio::test]
    async fn test_init_creates_loadable_project() {
        let dir = tempfile::tempdir().unwrap();
        execute(
            InitArgs {
                force: false,
                path: dir.path().to_path_buf(),
            },
            true,
        )
        .await
        .unwrap();

        let project = dir.path().join(PROJECT_DIR);
        assert!(project.join("work").is_dir());
        assert!(project.join("logs").is_dir());
        assert!(project.join("mender.db").is_file());

        let config = ConfigLoader::load_from_file(project.join("config.yaml")).unwrap();
        assert_eq!(config.logging.log_dir.as_deref(), Some(".mender/logs"));
        assert_eq!(config.controller.max_iterations, 5);
    }

    #[tokio::test]
    async fn test_init_without_force_keeps_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join("config.yaml"), "controller:\n  max_iterations: 2\n").unwrap();

        execute(
            InitArgs {
                force: false,
                path: dir.path().to_path_buf(),
            },
            true,
        )
        .await
        .unwrap();

        let contents = std::fs::read_to_string(project.join("config.yaml")).unwrap();
        assert!(contents.contains("max_iterations: 2"));
        assert!(!project.join("mender.db").exists());
    }
}
