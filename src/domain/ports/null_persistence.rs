//! Null persistence backend.
//!
//! Used when memory should live only for the lifetime of the process.

use async_trait::async_trait;

use super::PersistenceBackend;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    FailureRecord, FailureSignature, ImprovementRecord, MemorySnapshot, SolutionRecord,
};

/// A no-op backend that stores nothing.
#[derive(Debug, Clone, Default)]
pub struct NullPersistence;

impl NullPersistence {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PersistenceBackend for NullPersistence {
    async fn append_failure(&self, _record: &FailureRecord) -> DomainResult<()> {
        Ok(())
    }

    async fn failures(&self, _signature: &FailureSignature) -> DomainResult<Vec<FailureRecord>> {
        Ok(Vec::new())
    }

    async fn put_solution(&self, _record: &SolutionRecord) -> DomainResult<()> {
        Ok(())
    }

    async fn solution(&self, _problem_type: &str) -> DomainResult<Option<SolutionRecord>> {
        Ok(None)
    }

    async fn append_improvement(&self, _record: &ImprovementRecord) -> DomainResult<()> {
        Ok(())
    }

    async fn load_all(&self) -> DomainResult<MemorySnapshot> {
        Ok(MemorySnapshot::default())
    }
}
