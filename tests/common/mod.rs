//! Common test utilities for integration tests
//!
//! Shared fixtures for controller, memory and persistence tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use mender::adapters::substrates::{ScriptedExecutor, ScriptedGenerator};
use mender::domain::ports::{Executor, Generator};
use mender::services::{Controller, MemoryStore};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Path to a SQLite database file inside a fresh temporary directory
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let db_path = dir.path().join("mender.db");
    (dir, db_path)
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Scripted collaborators kept alive alongside the controller so tests can
/// inspect what the controller sent them.
pub struct Harness {
    pub generator: Arc<ScriptedGenerator>,
    pub executor: Arc<ScriptedExecutor>,
    pub memory: Arc<MemoryStore>,
    pub controller: Controller,
}

pub fn harness(generator: ScriptedGenerator, executor: ScriptedExecutor) -> Harness {
    harness_with_memory(generator, executor, Arc::new(MemoryStore::new()))
}

pub fn harness_with_memory(
    generator: ScriptedGenerator,
    executor: ScriptedExecutor,
    memory: Arc<MemoryStore>,
) -> Harness {
    let generator = Arc::new(generator);
    let executor = Arc::new(executor);
    let controller = Controller::new(
        Arc::clone(&generator) as Arc<dyn Generator>,
        Arc::clone(&executor) as Arc<dyn Executor>,
        Arc::clone(&memory),
    );
    Harness {
        generator,
        executor,
        memory,
        controller,
    }
}
