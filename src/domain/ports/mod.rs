//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the repair loop consumes:
//! - Generator: produces candidate code for a goal
//! - Executor: validates a candidate in isolation
//! - PersistenceBackend: durable storage for the shared memory tiers
//! - RootCauseClassifier: pluggable diagnosis used by reflection
//! - SubPatternExtractor: pluggable structural features used by the mistake guard

pub mod classifier;
pub mod executor;
pub mod generator;
pub mod null_persistence;
pub mod persistence;
pub mod sub_pattern;

pub use classifier::RootCauseClassifier;
pub use executor::{ExecutionResult, Executor, ExecutorError};
pub use generator::{Generator, GeneratorError};
pub use null_persistence::NullPersistence;
pub use persistence::PersistenceBackend;
pub use sub_pattern::SubPatternExtractor;
