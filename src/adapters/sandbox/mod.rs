//! Candidate execution adapters.

pub mod process;

pub use process::ProcessExecutor;
