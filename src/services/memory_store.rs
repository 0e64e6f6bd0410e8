//! Memory store for the repair loop.
//!
//! [`MemoryStore`] holds the two process-wide tiers, the failure ledger and
//! the solution cache, and may be shared by concurrent runs. Each run owns a
//! [`WorkingMemory`], which adds the short-term attempt buffer on top of the
//! shared store and is never shared.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Attempt, FailureRecord, FailureSignature, ImprovementRecord, LearningStats, MemoryStats,
    ShortTermBuffer, SolutionRecord,
};
use crate::domain::ports::{NullPersistence, PersistenceBackend};
use crate::services::pattern_extractor::similarity;

/// Number of signatures reported in [`MemoryStats::top_signatures`].
const TOP_SIGNATURES: usize = 5;

type FailureLedger = BTreeMap<FailureSignature, Vec<FailureRecord>>;

/// Shared failure ledger and solution cache.
///
/// `store_failure` is a single atomic append per signature and
/// `store_solution` a single atomic upsert per problem type: each holds the
/// tier's write lock across the durable write and the in-memory update, so
/// readers never observe a partial write and a failed durable write leaves
/// memory untouched.
pub struct MemoryStore {
    ledger: RwLock<FailureLedger>,
    solutions: RwLock<HashMap<String, SolutionRecord>>,
    improvements: RwLock<Vec<ImprovementRecord>>,
    backend: Arc<dyn PersistenceBackend>,
}

impl MemoryStore {
    /// Create an empty, process-local store.
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(BTreeMap::new()),
            solutions: RwLock::new(HashMap::new()),
            improvements: RwLock::new(Vec::new()),
            backend: Arc::new(NullPersistence::new()),
        }
    }

    /// Create a store backed by `backend`, hydrated with everything it holds.
    pub async fn with_backend(backend: Arc<dyn PersistenceBackend>) -> DomainResult<Self> {
        let snapshot = backend.load_all().await?;

        let mut ledger = FailureLedger::new();
        for record in snapshot.failures {
            ledger.entry(record.signature.clone()).or_default().push(record);
        }
        let solutions: HashMap<String, SolutionRecord> = snapshot
            .solutions
            .into_iter()
            .map(|s| (s.problem_type.clone(), s))
            .collect();

        info!(
            signatures = ledger.len(),
            solutions = solutions.len(),
            improvements = snapshot.improvements.len(),
            "memory store hydrated from backend"
        );

        Ok(Self {
            ledger: RwLock::new(ledger),
            solutions: RwLock::new(solutions),
            improvements: RwLock::new(snapshot.improvements),
            backend,
        })
    }

    /// All failures recorded under `signature`, oldest first.
    ///
    /// Read-only; returns an empty vector for unknown signatures.
    pub async fn recall_failures(&self, signature: &FailureSignature) -> Vec<FailureRecord> {
        self.ledger
            .read()
            .await
            .get(signature)
            .cloned()
            .unwrap_or_default()
    }

    /// Append a new failure record under `signature`.
    ///
    /// The returned record carries the updated occurrence count and the
    /// signature's original `first_seen`.
    pub async fn store_failure(
        &self,
        signature: FailureSignature,
        code: &str,
        error: &str,
        fix: Option<String>,
    ) -> DomainResult<FailureRecord> {
        let mut ledger = self.ledger.write().await;

        let now = Utc::now();
        let existing = ledger.get(&signature);
        let first_seen = existing
            .and_then(|records| records.first())
            .map_or(now, |first| first.first_seen);
        let previous = existing.map_or(0, Vec::len);
        let occurrence_count = u32::try_from(previous + 1).map_err(|_| {
            DomainError::ValidationFailed(format!("Too many failures recorded for '{signature}'"))
        })?;

        let record = FailureRecord {
            signature: signature.clone(),
            failed_code: code.to_string(),
            error_text: error.to_string(),
            fix,
            first_seen,
            last_seen: now,
            occurrence_count,
        };

        self.backend.append_failure(&record).await?;
        ledger.entry(signature).or_default().push(record.clone());

        debug!(
            signature = %record.signature,
            occurrence_count = record.occurrence_count,
            "failure recorded"
        );

        Ok(record)
    }

    /// Insert or replace the solution for `problem_type`.
    pub async fn store_solution(
        &self,
        problem_type: &str,
        solution: &str,
        success_rate: f64,
    ) -> DomainResult<SolutionRecord> {
        let record = SolutionRecord {
            problem_type: problem_type.to_string(),
            solution: solution.to_string(),
            success_rate,
            last_used: Utc::now(),
        };
        record.validate().map_err(DomainError::ValidationFailed)?;

        let mut solutions = self.solutions.write().await;
        self.backend.put_solution(&record).await?;
        solutions.insert(record.problem_type.clone(), record.clone());

        debug!(
            problem_type = %record.problem_type,
            success_rate = record.success_rate,
            "solution stored"
        );

        Ok(record)
    }

    /// The cached solution for `problem_type`, if any.
    pub async fn lookup_solution(&self, problem_type: &str) -> Option<SolutionRecord> {
        self.solutions.read().await.get(problem_type).cloned()
    }

    /// Latest record of each other signature at least `threshold` similar to
    /// `signature`, most similar first.
    pub async fn similar_failures(
        &self,
        signature: &FailureSignature,
        threshold: f64,
        limit: usize,
    ) -> Vec<FailureRecord> {
        let ledger = self.ledger.read().await;

        let mut scored: Vec<(f64, &FailureRecord)> = ledger
            .iter()
            .filter(|(key, _)| *key != signature)
            .filter_map(|(key, records)| {
                let score = similarity(signature, key);
                let latest = records.last()?;
                (score >= threshold).then_some((score, latest))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Number of records held under each signature, ordered by signature.
    pub async fn ledger_sizes(&self) -> Vec<(FailureSignature, usize)> {
        self.ledger
            .read()
            .await
            .iter()
            .map(|(sig, records)| (sig.clone(), records.len()))
            .collect()
    }

    /// Records under `signature` from position `start` onwards.
    pub async fn failures_since(
        &self,
        signature: &FailureSignature,
        start: usize,
    ) -> Vec<FailureRecord> {
        self.ledger
            .read()
            .await
            .get(signature)
            .and_then(|records| records.get(start..))
            .map(<[FailureRecord]>::to_vec)
            .unwrap_or_default()
    }

    /// Copy of the whole ledger, ordered by signature.
    pub async fn ledger_snapshot(&self) -> Vec<(FailureSignature, Vec<FailureRecord>)> {
        self.ledger
            .read()
            .await
            .iter()
            .map(|(sig, records)| (sig.clone(), records.clone()))
            .collect()
    }

    /// All cached solutions, ordered by problem type.
    pub async fn solutions(&self) -> Vec<SolutionRecord> {
        let mut solutions: Vec<SolutionRecord> =
            self.solutions.read().await.values().cloned().collect();
        solutions.sort_by(|a, b| a.problem_type.cmp(&b.problem_type));
        solutions
    }

    /// Append an optimizer improvement to the history.
    pub async fn log_improvement(&self, record: ImprovementRecord) -> DomainResult<ImprovementRecord> {
        let mut improvements = self.improvements.write().await;
        self.backend.append_improvement(&record).await?;
        improvements.push(record.clone());

        debug!(
            kind = record.kind.as_str(),
            before_lines = record.before_lines,
            after_lines = record.after_lines,
            "improvement logged"
        );

        Ok(record)
    }

    /// Improvement history, oldest first.
    pub async fn improvements(&self) -> Vec<ImprovementRecord> {
        self.improvements.read().await.clone()
    }

    pub async fn learning_stats(&self) -> LearningStats {
        let improvements = self.improvements.read().await;
        if improvements.is_empty() {
            return LearningStats::default();
        }

        let patterns: BTreeSet<&str> = improvements
            .iter()
            .flat_map(|r| r.patterns.iter().map(String::as_str))
            .collect();
        let total: i64 = improvements.iter().map(ImprovementRecord::reduction).sum();

        LearningStats {
            total_improvements: improvements.len(),
            pattern_count: patterns.len(),
            avg_reduction: total as f64 / improvements.len() as f64,
        }
    }

    /// Get memory statistics.
    pub async fn stats(&self) -> MemoryStats {
        let ledger = self.ledger.read().await;

        let mut counts: Vec<(FailureSignature, u32)> = ledger
            .iter()
            .filter_map(|(sig, records)| {
                records.last().map(|r| (sig.clone(), r.occurrence_count))
            })
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(TOP_SIGNATURES);

        MemoryStats {
            distinct_signatures: ledger.len(),
            total_failures: ledger.values().map(Vec::len).sum(),
            solutions: self.solutions.read().await.len(),
            top_signatures: counts,
            learning: self.learning_stats().await,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run view of memory: the short-term buffer plus the shared store.
///
/// Owned by exactly one run; appending requires `&mut self`.
pub struct WorkingMemory {
    store: Arc<MemoryStore>,
    buffer: ShortTermBuffer,
}

impl WorkingMemory {
    pub fn new(store: Arc<MemoryStore>, capacity: usize) -> Self {
        Self {
            store,
            buffer: ShortTermBuffer::new(capacity),
        }
    }

    /// Append to the short-term buffer, evicting the oldest attempt at capacity.
    pub fn record_attempt(&mut self, attempt: Attempt) -> Option<Attempt> {
        let evicted = self.buffer.push(attempt);
        if let Some(old) = &evicted {
            debug!(iteration = old.iteration, "evicted attempt from short-term buffer");
        }
        evicted
    }

    /// Short-term buffer contents, oldest first.
    pub fn recent_attempts(&self) -> Vec<Attempt> {
        self.buffer.snapshot()
    }

    /// The shared store this run writes through to.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{MemorySnapshot, OptimizationKind};
    use async_trait::async_trait;

    struct FailingBackend;

    #[async_trait]
    impl PersistenceBackend for FailingBackend {
        async fn append_failure(&self, _record: &FailureRecord) -> DomainResult<()> {
            Err(DomainError::Persistence("disk full".to_string()))
        }

        async fn failures(&self, _signature: &FailureSignature) -> DomainResult<Vec<FailureRecord>> {
            Ok(Vec::new())
        }

        async fn put_solution(&self, _record: &SolutionRecord) -> DomainResult<()> {
            Err(DomainError::Persistence("disk full".to_string()))
        }

        async fn solution(&self, _problem_type: &str) -> DomainResult<Option<SolutionRecord>> {
            Ok(None)
        }

        async fn append_improvement(&self, _record: &ImprovementRecord) -> DomainResult<()> {
            Err(DomainError::Persistence("disk full".to_string()))
        }

        async fn load_all(&self) -> DomainResult<MemorySnapshot> {
            Ok(MemorySnapshot::default())
        }
    }

    #[tokio::test]
    async fn test_store_failure_counts_in_insertion_order() {
        let store = MemoryStore::new();
        let sig = FailureSignature::from("NameError: name <*> is not defined");

        for i in 1..=3 {
            let record = store
                .store_failure(sig.clone(), &format!("print(v{i})"), "NameError", None)
                .await
                .unwrap();
            assert_eq!(record.occurrence_count, i);
        }

        let records = store.recall_failures(&sig).await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].failed_code, "print(v1)");
        assert_eq!(records[2].failed_code, "print(v3)");
        assert_eq!(records[2].occurrence_count, 3);
        assert_eq!(records[2].first_seen, records[0].first_seen);
    }

    #[tokio::test]
    async fn test_recall_unknown_signature_is_empty() {
        let store = MemoryStore::new();
        assert!(store.recall_failures(&"nothing".into()).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_solution_upserts() {
        let store = MemoryStore::new();
        store.store_solution("sort", "v1", 0.5).await.unwrap();
        store.store_solution("sort", "v2", 0.25).await.unwrap();

        let record = store.lookup_solution("sort").await.unwrap();
        assert_eq!(record.solution, "v2");
        assert!((record.success_rate - 0.25).abs() < f64::EPSILON);
        assert_eq!(store.solutions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_store_solution_rejects_out_of_range_rate() {
        let store = MemoryStore::new();
        let result = store.store_solution("sort", "v1", 1.2).await;
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));
        assert!(store.lookup_solution("sort").await.is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_memory_untouched() {
        let store = MemoryStore::with_backend(Arc::new(FailingBackend)).await.unwrap();
        let sig = FailureSignature::from("boom");

        let result = store.store_failure(sig.clone(), "code", "boom", None).await;
        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert!(store.recall_failures(&sig).await.is_empty());

        let result = store.store_solution("p", "s", 1.0).await;
        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert!(store.lookup_solution("p").await.is_none());

        let result = store
            .log_improvement(ImprovementRecord::new(OptimizationKind::Loops, "a", "a"))
            .await;
        assert!(matches!(result, Err(DomainError::Persistence(_))));
        assert!(store.improvements().await.is_empty());
    }

    #[tokio::test]
    async fn test_learning_stats_average_reduction() {
        let store = MemoryStore::new();
        assert_eq!(store.learning_stats().await, LearningStats::default());

        store
            .log_improvement(ImprovementRecord::new(
                OptimizationKind::Imports,
                "import a\n\nimport b\n\nx = a.f(b)",
                "import a\nimport b\n\nx = a.f(b)",
            ))
            .await
            .unwrap();
        store
            .log_improvement(ImprovementRecord::new(
                OptimizationKind::Loops,
                "for i in range(len(xs)):\n    print(i)",
                "for i in xs:\n    print(i)",
            ))
            .await
            .unwrap();

        let stats = store.stats().await.learning;
        assert_eq!(stats.total_improvements, 2);
        assert!((stats.avg_reduction - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.pattern_count, 1, "only `import` repeats");
    }

    #[tokio::test]
    async fn test_failures_since_returns_tail() {
        let store = MemoryStore::new();
        let sig = FailureSignature::from("E");
        for code in ["a", "b", "c"] {
            store.store_failure(sig.clone(), code, "E", None).await.unwrap();
        }

        let tail: Vec<String> = store
            .failures_since(&sig, 1)
            .await
            .into_iter()
            .map(|r| r.failed_code)
            .collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert!(store.failures_since(&sig, 5).await.is_empty());
        assert_eq!(store.ledger_sizes().await, vec![(sig, 3)]);
    }

    #[tokio::test]
    async fn test_similar_failures_excludes_exact_and_dissimilar() {
        let store = MemoryStore::new();
        let target = FailureSignature::from("NameError: name <*> is not defined");
        let near = FailureSignature::from("NameError: name <*> is not bound");
        let far = FailureSignature::from("ZeroDivisionError: division by zero");

        store.store_failure(target.clone(), "a", "e", None).await.unwrap();
        store.store_failure(near.clone(), "b", "e", None).await.unwrap();
        store.store_failure(near.clone(), "c", "e", None).await.unwrap();
        store.store_failure(far, "d", "e", None).await.unwrap();

        let similar = store.similar_failures(&target, 0.6, 10).await;
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].signature, near);
        assert_eq!(similar[0].failed_code, "c");
    }

    #[tokio::test]
    async fn test_stats() {
        let store = MemoryStore::new();
        store.store_failure("a".into(), "x", "a", None).await.unwrap();
        store.store_failure("a".into(), "y", "a", None).await.unwrap();
        store.store_failure("b".into(), "z", "b", None).await.unwrap();
        store.store_solution("p", "s", 1.0).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.distinct_signatures, 2);
        assert_eq!(stats.total_failures, 3);
        assert_eq!(stats.solutions, 1);
        assert_eq!(stats.top_signatures[0], (FailureSignature::from("a"), 2));
    }

    #[tokio::test]
    async fn test_working_memory_is_bounded() {
        let mut working = WorkingMemory::new(Arc::new(MemoryStore::new()), 2);
        for i in 1..=3 {
            working.record_attempt(Attempt::vetoed(i, String::new(), String::new()));
        }
        let iterations: Vec<u32> = working.recent_attempts().iter().map(|a| a.iteration).collect();
        assert_eq!(iterations, vec![2, 3]);
    }
}
