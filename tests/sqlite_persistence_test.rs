//! SQLite-backed memory: durability across restarts and controller integration.

mod common;

use std::sync::Arc;

use mender::adapters::sqlite::{database_url, initialize_database, SqlitePersistence};
use mender::adapters::substrates::{ScriptedExecutor, ScriptedGenerator};
use mender::domain::models::{FailureSignature, RunPolicy, RunStatus};
use mender::domain::ports::PersistenceBackend;
use mender::services::{CodeOptimizer, MemoryStore};

use common::{harness_with_memory, temp_db_path};

async fn open_store(url: &str) -> (sqlx::SqlitePool, Arc<MemoryStore>) {
    let pool = initialize_database(url, None).await.expect("database should open");
    let store = MemoryStore::with_backend(Arc::new(SqlitePersistence::new(pool.clone())))
        .await
        .expect("store should hydrate");
    (pool, Arc::new(store))
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let (_dir, path) = temp_db_path();
    let url = database_url(&path.to_string_lossy());
    let sig = FailureSignature::new("KeyError: <*>");

    {
        let (pool, store) = open_store(&url).await;
        store.store_failure(sig.clone(), "d['a']", "KeyError: 'a'", None).await.unwrap();
        store
            .store_failure(sig.clone(), "d['b']", "KeyError: 'b'", Some("use .get".to_string()))
            .await
            .unwrap();
        store.store_solution("lookup", "d.get('a')", 0.5).await.unwrap();
        pool.close().await;
    }

    let (pool, store) = open_store(&url).await;
    let records = store.recall_failures(&sig).await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].failed_code, "d['a']");
    assert_eq!(records[1].occurrence_count, 2);
    assert_eq!(records[1].fix.as_deref(), Some("use .get"));
    assert_eq!(records[0].first_seen, records[1].first_seen);

    // Appending after a restart continues the count
    let third = store.store_failure(sig.clone(), "d['c']", "KeyError: 'c'", None).await.unwrap();
    assert_eq!(third.occurrence_count, 3);

    let solution = store.lookup_solution("lookup").await.unwrap();
    assert_eq!(solution.solution, "d.get('a')");
    pool.close().await;
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (_dir, path) = temp_db_path();
    let url = database_url(&path.to_string_lossy());

    let pool = initialize_database(&url, None).await.unwrap();
    pool.close().await;
    let pool = initialize_database(&url, None).await.unwrap();

    let backend = SqlitePersistence::new(pool.clone());
    assert!(backend.load_all().await.unwrap().failures.is_empty());
    pool.close().await;
}

#[tokio::test]
async fn test_runs_write_through_to_database() {
    let (_dir, path) = temp_db_path();
    let url = database_url(&path.to_string_lossy());
    let (pool, store) = open_store(&url).await;

    let h = harness_with_memory(
        ScriptedGenerator::new(["return x", "return x + 1"]),
        ScriptedExecutor::pass_on(2),
        Arc::clone(&store),
    );
    let outcome = h.controller.run("Increment x", &RunPolicy::new(3)).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Success);

    let backend = SqlitePersistence::new(pool.clone());
    let persisted = backend.failures(&outcome.failures_seen[0]).await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].failed_code, "return x");
    assert!(persisted[0].fix.is_some());

    let solution = backend.solution("increment x").await.unwrap().unwrap();
    assert_eq!(solution.solution, "return x + 1");
    assert!((solution.success_rate - 0.5).abs() < f64::EPSILON);
    pool.close().await;
}

#[tokio::test]
async fn test_improvement_history_survives_restart() {
    let (_dir, path) = temp_db_path();
    let url = database_url(&path.to_string_lossy());

    {
        let (pool, store) = open_store(&url).await;
        CodeOptimizer::new()
            .optimize_and_log("x = 1\nimport os\nfor i in range(len(xs)):\n    os.f(i)", &store)
            .await
            .unwrap();
        pool.close().await;
    }

    let (pool, store) = open_store(&url).await;
    let stats = store.learning_stats().await;
    assert_eq!(stats.total_improvements, 2);
    assert!(stats.avg_reduction.abs() < f64::EPSILON);
    pool.close().await;
}
