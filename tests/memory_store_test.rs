//! Memory store behaviour: buffer bounds, ledger append semantics, cache upserts
//! and concurrent access.

use std::sync::Arc;

use chrono::Utc;
use mender::domain::models::{Attempt, FailureSignature, ShortTermBuffer};
use mender::services::{MemoryStore, WorkingMemory};
use proptest::prelude::*;

fn attempt(iteration: u32) -> Attempt {
    Attempt::validated(iteration, format!("code {iteration}"), "err".to_string(), false, None)
}

proptest! {
    /// Property: the buffer never exceeds capacity and keeps the newest attempts in order
    #[test]
    fn prop_buffer_keeps_last_capacity(capacity in 1usize..10, appends in 0u32..30) {
        let mut buffer = ShortTermBuffer::new(capacity);
        for i in 1..=appends {
            buffer.push(attempt(i));
            prop_assert!(buffer.len() <= capacity);
        }

        let kept: Vec<u32> = buffer.iter().map(|a| a.iteration).collect();
        let start = appends.saturating_sub(u32::try_from(capacity).unwrap()) + 1;
        let expected: Vec<u32> = (start..=appends).collect();
        prop_assert_eq!(kept, expected);
    }

    /// Property: k appends under one signature recall as k records in insertion order
    #[test]
    fn prop_ledger_counts(k in 1usize..15) {
        let store = MemoryStore::new();
        let sig = FailureSignature::new("ValueError: <*>");

        tokio_test::block_on(async {
            for i in 0..k {
                store
                    .store_failure(sig.clone(), &format!("code {i}"), "ValueError: 3", None)
                    .await
                    .unwrap();
            }
        });

        let records = tokio_test::block_on(store.recall_failures(&sig));
        prop_assert_eq!(records.len(), k);
        let codes: Vec<String> = records.iter().map(|r| r.failed_code.clone()).collect();
        let expected: Vec<String> = (0..k).map(|i| format!("code {i}")).collect();
        prop_assert_eq!(codes, expected);
        prop_assert_eq!(records.last().unwrap().occurrence_count as usize, k);
        prop_assert!(records.iter().all(|r| r.first_seen == records[0].first_seen));
    }
}

#[tokio::test]
async fn test_recall_unknown_signature_is_empty() {
    let store = MemoryStore::new();
    assert!(store.recall_failures(&FailureSignature::new("nope")).await.is_empty());
}

#[tokio::test]
async fn test_store_solution_upserts() {
    let store = MemoryStore::new();
    let before = Utc::now();

    store.store_solution("sorting", "v1", 0.5).await.unwrap();
    store.store_solution("sorting", "v2", 1.0).await.unwrap();

    let solution = store.lookup_solution("sorting").await.unwrap();
    assert_eq!(solution.solution, "v2");
    assert!((solution.success_rate - 1.0).abs() < f64::EPSILON);
    assert!(solution.last_used >= before);
    assert_eq!(store.solutions().await.len(), 1);
}

#[tokio::test]
async fn test_invalid_success_rate_leaves_cache_untouched() {
    let store = MemoryStore::new();
    assert!(store.store_solution("sorting", "v1", 1.5).await.is_err());
    assert!(store.lookup_solution("sorting").await.is_none());
}

#[tokio::test]
async fn test_working_memory_is_per_run() {
    let store = Arc::new(MemoryStore::new());
    let mut first = WorkingMemory::new(Arc::clone(&store), 2);
    let second = WorkingMemory::new(Arc::clone(&store), 2);

    first.record_attempt(attempt(1));
    first.record_attempt(attempt(2));
    let evicted = first.record_attempt(attempt(3));

    assert_eq!(evicted.map(|a| a.iteration), Some(1));
    assert_eq!(first.recent_attempts().len(), 2);
    assert!(second.recent_attempts().is_empty());
}

#[tokio::test]
async fn test_concurrent_appends_keep_counts_consistent() {
    let store = Arc::new(MemoryStore::new());
    let sig = FailureSignature::new("TIMEOUT");

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            let sig = sig.clone();
            tokio::spawn(async move {
                store
                    .store_failure(sig, &format!("code {i}"), "TIMEOUT", None)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut counts = Vec::new();
    for task in tasks {
        counts.push(task.await.unwrap().occurrence_count);
    }
    counts.sort_unstable();
    assert_eq!(counts, (1..=16).collect::<Vec<u32>>());

    let records = store.recall_failures(&sig).await;
    assert_eq!(records.len(), 16);
    let in_order: Vec<u32> = records.iter().map(|r| r.occurrence_count).collect();
    assert_eq!(in_order, (1..=16).collect::<Vec<u32>>());
}

#[tokio::test]
async fn test_similar_failures_excludes_exact_signature() {
    let store = MemoryStore::new();
    let base = FailureSignature::new("TypeError: unsupported operand type(s) for +");
    let near = FailureSignature::new("TypeError: unsupported operand type(s) for -");
    let far = FailureSignature::new("ImportError: no module");

    store.store_failure(base.clone(), "a", "e", None).await.unwrap();
    store.store_failure(near.clone(), "b", "e", None).await.unwrap();
    store.store_failure(far, "c", "e", None).await.unwrap();

    let similar = store.similar_failures(&base, 0.6, 5).await;
    assert_eq!(similar.len(), 1);
    assert_eq!(similar[0].signature, near);
}
