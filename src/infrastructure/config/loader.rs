use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::{Config, GuardMode};

/// Project directory holding config, database and work files.
pub const PROJECT_DIR: &str = ".mender";

/// Environment variable prefix; `__` separates nested keys.
pub const ENV_PREFIX: &str = "MENDER_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid short_term_capacity: {0}. Must be at least 1")]
    InvalidShortTermCapacity(usize),

    #[error("Invalid guard mode: {0}. Must be one of: warn, block")]
    InvalidGuardMode(String),

    #[error("Invalid {0} timeout: must be at least 1 second")]
    InvalidTimeout(&'static str),

    #[error("Invalid signature_max_len: must be at least 1")]
    InvalidSignatureLength,

    #[error("Invalid similarity_threshold: {0}. Must be between 0.0 and 1.0")]
    InvalidSimilarityThreshold(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Executor command cannot be empty")]
    EmptyExecutorCommand,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mender/config.yaml (project config, created by init)
    /// 3. .mender/local.yaml (project local overrides, optional)
    /// 4. Environment variables (MENDER_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`load`](Self::load), rooted at `root` instead of the working directory.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let project = root.as_ref().join(PROJECT_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project.join("config.yaml")))
            .merge(Yaml::file(project.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let controller = &config.controller;
        if controller.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(controller.max_iterations));
        }
        if controller.short_term_capacity == 0 {
            return Err(ConfigError::InvalidShortTermCapacity(
                controller.short_term_capacity,
            ));
        }
        if GuardMode::from_str(&controller.guard_mode).is_none() {
            return Err(ConfigError::InvalidGuardMode(controller.guard_mode.clone()));
        }
        if controller.generation_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("generation"));
        }
        if controller.execution_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("execution"));
        }

        if config.memory.signature_max_len == 0 {
            return Err(ConfigError::InvalidSignatureLength);
        }
        if !(0.0..=1.0).contains(&config.memory.similarity_threshold) {
            return Err(ConfigError::InvalidSimilarityThreshold(
                config.memory.similarity_threshold,
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.executor.command.trim().is_empty() {
            return Err(ConfigError::EmptyExecutorCommand);
        }
        if config.executor.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("executor"));
        }

        Ok(())
    }
}
