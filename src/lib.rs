//! Mender - autonomous iterative code repair
//!
//! Mender drives a generate, validate and reflect loop toward a goal. Every
//! failure is distilled into a signature and recorded in a shared ledger so
//! later iterations, and later runs, avoid repeating it.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Controller, memory, extraction, reflection, guard and optimizer
//! - **Adapter Layer** (`adapters`): SQLite persistence, process executor, command generator
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use mender::adapters::substrates::{ScriptedExecutor, ScriptedGenerator};
//! use mender::domain::models::RunPolicy;
//! use mender::services::{Controller, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let controller = Controller::new(
//!         Arc::new(ScriptedGenerator::repeating("print('ok')")),
//!         Arc::new(ScriptedExecutor::always_pass()),
//!         Arc::new(MemoryStore::new()),
//!     );
//!     let outcome = controller.run("print ok", &RunPolicy::new(3)).await?;
//!     assert!(outcome.is_success());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, FailureRecord, FailureSignature, GuardMode, RunOutcome, RunPolicy, RunStatus,
    SolutionRecord,
};
pub use domain::ports::{Executor, Generator, PersistenceBackend};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Controller, MemoryStore, MistakeGuard, PatternExtractor, ReflectionEngine};
