use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    FailureRecord, FailureSignature, ImprovementRecord, MemorySnapshot, SolutionRecord,
};

/// Durable storage for the failure ledger and the solution cache.
///
/// Provides async methods with the same semantics as the in-memory tiers:
/// - Failures are appended and returned in insertion order
/// - Solutions are upserted by problem type (last write wins)
/// - Improvements are appended and returned in insertion order
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Append one failure record under its signature.
    async fn append_failure(&self, record: &FailureRecord) -> DomainResult<()>;

    /// All records stored under `signature`, oldest first.
    ///
    /// Returns an empty vector when the signature is unknown.
    async fn failures(&self, signature: &FailureSignature) -> DomainResult<Vec<FailureRecord>>;

    /// Insert or replace the solution for its problem type.
    async fn put_solution(&self, record: &SolutionRecord) -> DomainResult<()>;

    /// The stored solution for `problem_type`, if any.
    async fn solution(&self, problem_type: &str) -> DomainResult<Option<SolutionRecord>>;

    /// Append one optimizer improvement to the history.
    async fn append_improvement(&self, record: &ImprovementRecord) -> DomainResult<()>;

    /// Load everything, used to hydrate the in-memory store at startup.
    async fn load_all(&self) -> DomainResult<MemorySnapshot>;
}
