//! Repair loop services: controller, memory, extraction, reflection and guard,
//! plus the standalone analyzer and optimizer.

pub mod code_analyzer;
pub mod code_optimizer;
pub mod controller;
pub mod memory_store;
pub mod mistake_guard;
pub mod pattern_extractor;
pub mod reflection_engine;

pub use code_analyzer::CodeAnalyzer;
pub use code_optimizer::{CodeOptimizer, Optimization};
pub use controller::{
    problem_type_for, Controller, ControllerConfig, ControllerError, InfrastructureError,
    RunState,
};
pub use memory_store::{MemoryStore, WorkingMemory};
pub use mistake_guard::{MistakeGuard, StructuralExtractor};
pub use pattern_extractor::{similarity, PatternExtractor, DEFAULT_MAX_SIGNATURE_LEN, PLACEHOLDER};
pub use reflection_engine::{ReflectionEngine, RuleBasedClassifier};
