pub mod analysis;
pub mod attempt;
pub mod config;
pub mod guard;
pub mod improvement;
pub mod memory;
pub mod reflection;
pub mod run;

pub use analysis::{CodeAnalysis, CodeMetrics};
pub use attempt::{Attempt, AttemptKind, ShortTermBuffer, DEFAULT_SHORT_TERM_CAPACITY};
pub use config::{
    Config, ControllerSettings, DatabaseConfig, ExecutorConfig, GeneratorConfig, LoggingConfig,
    MemoryConfig,
};
pub use guard::{GuardMode, SubPattern, Warning};
pub use improvement::{ImprovementRecord, LearningStats, OptimizationKind};
pub use memory::{FailureRecord, FailureSignature, MemorySnapshot, MemoryStats, SolutionRecord};
pub use reflection::{ReflectionResult, RootCause};
pub use run::{AbortReason, Plan, RunOutcome, RunPolicy, RunStatus, DEFAULT_MAX_ITERATIONS};
