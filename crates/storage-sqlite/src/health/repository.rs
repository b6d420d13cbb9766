//! Health run repository implementation.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::SqliteConnection;
use std::sync::Arc;

use scholaris_core::health::{HealthRun, HealthRunStore};
use scholaris_core::Result;

use super::model::HealthRunDB;
use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::health_runs;
use crate::schema::health_runs::dsl::*;

/// Insert-only store of health runs. Reads go through the pool, the single
/// insert goes through the writer actor.
pub struct HealthRunRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl HealthRunRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }

    fn get_run_impl(&self, run_id: &str) -> Result<Option<HealthRun>> {
        let mut conn = get_connection(&self.pool)?;
        let result = health_runs
            .find(run_id)
            .select(HealthRunDB::as_select())
            .first::<HealthRunDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        match result {
            Some(row) => Ok(Some(HealthRun::try_from(row)?)),
            None => Ok(None),
        }
    }

    fn list_runs_impl(&self, limit: usize) -> Result<Vec<HealthRun>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = health_runs
            .select(HealthRunDB::as_select())
            .order((checked_at.desc(), id.desc()))
            .limit(limit as i64)
            .load::<HealthRunDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| HealthRun::try_from(row).map_err(Into::into))
            .collect()
    }

    fn count_runs_impl(&self) -> Result<u64> {
        let mut conn = get_connection(&self.pool)?;
        let total = health_runs
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(total.max(0) as u64)
    }
}

#[async_trait]
impl HealthRunStore for HealthRunRepository {
    async fn save_run(&self, run: &HealthRun) -> Result<()> {
        let run_db = HealthRunDB::try_from(run)?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(health_runs::table)
                    .values(&run_db)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<HealthRun>> {
        self.get_run_impl(run_id)
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<HealthRun>> {
        self.list_runs_impl(limit)
    }

    async fn count_runs(&self) -> Result<u64> {
        self.count_runs_impl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init, run_migrations, spawn_writer};
    use chrono::{Duration, Utc};
    use scholaris_core::health::{CheckerKind, CheckerResult, Issue, IssueCategory, Severity};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    async fn create_test_repository() -> (HealthRunRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        init(&db_path).expect("Failed to init database");
        let pool = create_pool(&db_path).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());
        (HealthRunRepository::new(pool, writer), temp_dir)
    }

    fn sample_run(minutes_ago: i64) -> HealthRun {
        let mut results = BTreeMap::new();
        results.insert(
            CheckerKind::Integrity,
            CheckerResult::completed(
                vec![Issue::new(
                    IssueCategory::OrphanedRecords,
                    Severity::Critical,
                    "grades",
                    "1 grades row references a missing students row",
                )
                .with_affected_count(1)],
                12,
            ),
        );
        results.insert(
            CheckerKind::BusinessRules,
            CheckerResult::failed("Data store query failed: no such table", 3),
        );
        HealthRun::new(
            "admin@school.edu",
            Utc::now() - Duration::minutes(minutes_ago),
            results,
            40,
        )
    }

    #[tokio::test]
    async fn test_save_and_get_run() {
        let (repo, _dir) = create_test_repository().await;
        let run = sample_run(0);

        repo.save_run(&run).await.unwrap();
        let loaded = repo.get_run(&run.id).await.unwrap().expect("run should exist");

        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.checked_by, "admin@school.edu");
        assert_eq!(loaded.summary(), run.summary());
        assert_eq!(loaded.issues_detail, run.issues_detail);
        assert_eq!(
            loaded.issues_detail[&CheckerKind::BusinessRules].error(),
            Some("Data store query failed: no such table")
        );
    }

    #[tokio::test]
    async fn test_runs_are_insert_only() {
        let (repo, _dir) = create_test_repository().await;
        let run = sample_run(0);

        repo.save_run(&run).await.unwrap();
        assert!(repo.save_run(&run).await.is_err());
        assert_eq!(repo.count_runs().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_runs_newest_first() {
        let (repo, _dir) = create_test_repository().await;
        let old = sample_run(30);
        let new = sample_run(1);
        repo.save_run(&old).await.unwrap();
        repo.save_run(&new).await.unwrap();

        let runs = repo.list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, new.id);
        assert_eq!(runs[1].id, old.id);

        assert_eq!(repo.list_runs(1).await.unwrap().len(), 1);
        assert!(repo.get_run("missing").await.unwrap().is_none());
    }
}
