//! SQLite implementation of the PersistenceBackend.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    FailureRecord, FailureSignature, ImprovementRecord, MemorySnapshot, OptimizationKind,
    SolutionRecord,
};
use crate::domain::ports::PersistenceBackend;

use super::parse_datetime;

#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceBackend for SqlitePersistence {
    async fn append_failure(&self, record: &FailureRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO failures (signature, failed_code, error_text, fix,
               first_seen, last_seen, occurrence_count)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.signature.as_str())
        .bind(&record.failed_code)
        .bind(&record.error_text)
        .bind(&record.fix)
        .bind(record.first_seen.to_rfc3339())
        .bind(record.last_seen.to_rfc3339())
        .bind(i64::from(record.occurrence_count))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn failures(&self, signature: &FailureSignature) -> DomainResult<Vec<FailureRecord>> {
        let rows: Vec<FailureRow> = sqlx::query_as(
            "SELECT * FROM failures WHERE signature = ? ORDER BY id",
        )
        .bind(signature.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FailureRecord::try_from).collect()
    }

    async fn put_solution(&self, record: &SolutionRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO solutions (problem_type, solution, success_rate, last_used)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(problem_type) DO UPDATE SET
                   solution = excluded.solution,
                   success_rate = excluded.success_rate,
                   last_used = excluded.last_used"#,
        )
        .bind(&record.problem_type)
        .bind(&record.solution)
        .bind(record.success_rate)
        .bind(record.last_used.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn solution(&self, problem_type: &str) -> DomainResult<Option<SolutionRecord>> {
        let row: Option<SolutionRow> =
            sqlx::query_as("SELECT * FROM solutions WHERE problem_type = ?")
                .bind(problem_type)
                .fetch_optional(&self.pool)
                .await?;

        row.map(SolutionRecord::try_from).transpose()
    }

    async fn append_improvement(&self, record: &ImprovementRecord) -> DomainResult<()> {
        let patterns = serde_json::to_string(&record.patterns)?;

        sqlx::query(
            r#"INSERT INTO improvements (kind, before_lines, after_lines, patterns, recorded_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(record.kind.as_str())
        .bind(i64::try_from(record.before_lines).unwrap_or(i64::MAX))
        .bind(i64::try_from(record.after_lines).unwrap_or(i64::MAX))
        .bind(patterns)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_all(&self) -> DomainResult<MemorySnapshot> {
        let failures: Vec<FailureRow> = sqlx::query_as("SELECT * FROM failures ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let solutions: Vec<SolutionRow> =
            sqlx::query_as("SELECT * FROM solutions ORDER BY problem_type")
                .fetch_all(&self.pool)
                .await?;
        let improvements: Vec<ImprovementRow> =
            sqlx::query_as("SELECT * FROM improvements ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(MemorySnapshot {
            failures: failures
                .into_iter()
                .map(FailureRecord::try_from)
                .collect::<DomainResult<_>>()?,
            solutions: solutions
                .into_iter()
                .map(SolutionRecord::try_from)
                .collect::<DomainResult<_>>()?,
            improvements: improvements
                .into_iter()
                .map(ImprovementRecord::try_from)
                .collect::<DomainResult<_>>()?,
        })
    }
}

#[derive(sqlx::FromRow)]
#[allow(dead_code)]
struct FailureRow {
    id: i64,
    signature: String,
    failed_code: String,
    error_text: String,
    fix: Option<String>,
    first_seen: String,
    last_seen: String,
    occurrence_count: i64,
}

impl TryFrom<FailureRow> for FailureRecord {
    type Error = DomainError;

    fn try_from(row: FailureRow) -> Result<Self, Self::Error> {
        let occurrence_count = u32::try_from(row.occurrence_count).map_err(|_| {
            DomainError::SerializationError(format!(
                "Invalid occurrence count {} for failure {}",
                row.occurrence_count, row.id
            ))
        })?;

        Ok(Self {
            signature: FailureSignature::new(row.signature),
            failed_code: row.failed_code,
            error_text: row.error_text,
            fix: row.fix,
            first_seen: parse_datetime(&row.first_seen)?,
            last_seen: parse_datetime(&row.last_seen)?,
            occurrence_count,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SolutionRow {
    problem_type: String,
    solution: String,
    success_rate: f64,
    last_used: String,
}

impl TryFrom<SolutionRow> for SolutionRecord {
    type Error = DomainError;

    fn try_from(row: SolutionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            problem_type: row.problem_type,
            solution: row.solution,
            success_rate: row.success_rate,
            last_used: parse_datetime(&row.last_used)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ImprovementRow {
    id: i64,
    kind: String,
    before_lines: i64,
    after_lines: i64,
    patterns: String,
    recorded_at: String,
}

impl TryFrom<ImprovementRow> for ImprovementRecord {
    type Error = DomainError;

    fn try_from(row: ImprovementRow) -> Result<Self, Self::Error> {
        let kind = OptimizationKind::from_str(&row.kind).ok_or_else(|| {
            DomainError::SerializationError(format!(
                "Unknown optimization kind '{}' for improvement {}",
                row.kind, row.id
            ))
        })?;
        let lines = |value: i64| {
            usize::try_from(value).map_err(|_| {
                DomainError::SerializationError(format!(
                    "Invalid line count {value} for improvement {}",
                    row.id
                ))
            })
        };

        Ok(Self {
            kind,
            before_lines: lines(row.before_lines)?,
            after_lines: lines(row.after_lines)?,
            patterns: serde_json::from_str(&row.patterns)?,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use chrono::Utc;

    async fn setup() -> SqlitePersistence {
        SqlitePersistence::new(create_migrated_test_pool().await.unwrap())
    }

    fn failure(signature: &str, code: &str, count: u32) -> FailureRecord {
        FailureRecord {
            signature: FailureSignature::from(signature),
            failed_code: code.to_string(),
            error_text: format!("{signature} raised"),
            fix: Some("check inputs".to_string()),
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            occurrence_count: count,
        }
    }

    #[tokio::test]
    async fn test_failures_round_trip_in_order() {
        let backend = setup().await;
        backend.append_failure(&failure("a", "one", 1)).await.unwrap();
        backend.append_failure(&failure("b", "other", 1)).await.unwrap();
        backend.append_failure(&failure("a", "two", 2)).await.unwrap();

        let records = backend.failures(&"a".into()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].failed_code, "one");
        assert_eq!(records[1].failed_code, "two");
        assert_eq!(records[1].occurrence_count, 2);
        assert_eq!(records[1].fix.as_deref(), Some("check inputs"));

        assert!(backend.failures(&"missing".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_solution_upsert() {
        let backend = setup().await;
        let mut record = SolutionRecord {
            problem_type: "sort".to_string(),
            solution: "v1".to_string(),
            success_rate: 0.5,
            last_used: Utc::now(),
        };
        backend.put_solution(&record).await.unwrap();
        record.solution = "v2".to_string();
        record.success_rate = 1.0;
        backend.put_solution(&record).await.unwrap();

        let stored = backend.solution("sort").await.unwrap().unwrap();
        assert_eq!(stored.solution, "v2");
        assert!((stored.success_rate - 1.0).abs() < f64::EPSILON);
        assert_eq!(backend.load_all().await.unwrap().solutions.len(), 1);
    }

    #[tokio::test]
    async fn test_improvements_round_trip_in_order() {
        let backend = setup().await;
        let first = ImprovementRecord::new(OptimizationKind::Imports, "import b\nimport a", "import a\nimport b");
        let second = ImprovementRecord::new(OptimizationKind::Loops, "for i in range(len(xs)): f(i)\nf(i)", "for i in xs: f(i)");
        backend.append_improvement(&first).await.unwrap();
        backend.append_improvement(&second).await.unwrap();

        let loaded = backend.load_all().await.unwrap().improvements;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].kind, OptimizationKind::Imports);
        assert_eq!(loaded[0].patterns, vec!["import".to_string()]);
        assert_eq!(loaded[1].kind, OptimizationKind::Loops);
        assert_eq!(loaded[1].before_lines, 2);
        assert_eq!(loaded[1].after_lines, 1);
    }
}
