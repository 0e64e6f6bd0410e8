//! Candidate generator adapters and scripted test doubles.

pub mod command;
pub mod mock;

pub use command::{CommandGenerator, GenerationRequest};
pub use mock::{ExecutorStep, GeneratorStep, ScriptedExecutor, ScriptedGenerator};
