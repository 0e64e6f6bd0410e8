use serde::{Deserialize, Serialize};

/// Main configuration structure for Mender
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Repair loop defaults and per-call timeouts
    #[serde(default)]
    pub controller: ControllerSettings,

    /// Memory and signature settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Candidate generator command
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Candidate executor command
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Repair loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControllerSettings {
    /// Default iteration budget per goal
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Mistake guard mode: warn or block
    #[serde(default = "default_guard_mode")]
    pub guard_mode: String,

    /// Capacity of the per-run short-term buffer
    #[serde(default = "default_short_term_capacity")]
    pub short_term_capacity: usize,

    /// Upper bound on a single generator call in seconds
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Upper bound on a single executor call in seconds
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,
}

const fn default_max_iterations() -> u32 {
    5
}

fn default_guard_mode() -> String {
    "warn".to_string()
}

const fn default_short_term_capacity() -> usize {
    5
}

const fn default_generation_timeout_secs() -> u64 {
    120
}

const fn default_execution_timeout_secs() -> u64 {
    60
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            guard_mode: default_guard_mode(),
            short_term_capacity: default_short_term_capacity(),
            generation_timeout_secs: default_generation_timeout_secs(),
            execution_timeout_secs: default_execution_timeout_secs(),
        }
    }
}

/// Memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MemoryConfig {
    /// Maximum length of a failure signature
    #[serde(default = "default_signature_max_len")]
    pub signature_max_len: usize,

    /// Minimum similarity for a ledger entry to count as related (0.0-1.0)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum number of related failures handed to the generator
    #[serde(default = "default_related_failures_limit")]
    pub related_failures_limit: usize,

    /// Persist the ledger and solution cache to the database
    #[serde(default = "default_persist")]
    pub persist: bool,
}

const fn default_signature_max_len() -> usize {
    50
}

const fn default_similarity_threshold() -> f64 {
    0.6
}

const fn default_related_failures_limit() -> usize {
    5
}

const fn default_persist() -> bool {
    true
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            signature_max_len: default_signature_max_len(),
            similarity_threshold: default_similarity_threshold(),
            related_failures_limit: default_related_failures_limit(),
            persist: default_persist(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".mender/mender.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Generator command configuration
///
/// The command receives a JSON request on stdin and prints the candidate on stdout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GeneratorConfig {
    /// Program to execute; empty means no generator is configured
    #[serde(default)]
    pub command: String,

    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,
}

/// Executor command configuration
///
/// The candidate is written to a file whose path is appended to `args`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutorConfig {
    /// Interpreter or test runner to execute
    #[serde(default = "default_executor_command")]
    pub command: String,

    /// Arguments placed before the candidate path
    #[serde(default)]
    pub args: Vec<String>,

    /// Extension of the candidate file
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Directory candidate files are written to
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Executor-side limit on a single run in seconds
    #[serde(default = "default_executor_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_executor_command() -> String {
    "python3".to_string()
}

fn default_file_extension() -> String {
    "py".to_string()
}

fn default_work_dir() -> String {
    ".mender/work".to_string()
}

const fn default_executor_timeout_secs() -> u64 {
    30
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: default_executor_command(),
            args: Vec::new(),
            file_extension: default_file_extension(),
            work_dir: default_work_dir(),
            timeout_secs: default_executor_timeout_secs(),
        }
    }
}
