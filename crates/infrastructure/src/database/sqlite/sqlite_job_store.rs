use async_trait::async_trait;
use cadence_core::{Job, JobCodec, JobStatus, SchedulerError, SchedulerResult, Store};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use super::{from_micros, to_micros};
use crate::database::connect_sqlite;

/// SQLite 任务存储
///
/// 每行保存编码后的完整任务，`next_run_time` 与 `paused` 单独成列用于排序。
pub struct SqliteStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_table(pool, "cadence_jobs")
    }

    pub fn with_table(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// 按 URL 创建连接池并建表
    pub async fn connect(url: &str) -> SchedulerResult<Self> {
        let store = Self::new(connect_sqlite(url).await?);
        store.init().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<Job> {
        let state: Vec<u8> = row.try_get("state")?;
        JobCodec::decode(&state)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> SchedulerResult<()> {
        debug!("Running SQLite job store migrations");
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                next_run_time INTEGER NOT NULL,
                paused INTEGER NOT NULL DEFAULT 0,
                state BLOB NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_next_run_time ON {0} (paused, next_run_time)",
            self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn add_job(&self, job: &Job) -> SchedulerResult<()> {
        let state = JobCodec::dump(job)?;
        let result = sqlx::query(&format!(
            "INSERT INTO {} (id, next_run_time, paused, state) VALUES ($1, $2, $3, $4)",
            self.table
        ))
        .bind(&job.id)
        .bind(to_micros(job.next_run_time))
        .bind(job.status == JobStatus::Paused)
        .bind(state)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(SchedulerError::DuplicateJob { id: job.id.clone() })
            }
            Err(e) => Err(SchedulerError::Database(e)),
        }
    }

    async fn get_job(&self, id: &str) -> SchedulerResult<Job> {
        let row = sqlx::query(&format!("SELECT state FROM {} WHERE id = $1", self.table))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_job(&row),
            None => Err(SchedulerError::job_not_found(id)),
        }
    }

    async fn get_all_jobs(&self) -> SchedulerResult<Vec<Job>> {
        let rows = sqlx::query(&format!("SELECT state FROM {}", self.table))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_job).collect()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn update_job(&self, job: &Job) -> SchedulerResult<()> {
        let state = JobCodec::dump(job)?;
        let result = sqlx::query(&format!(
            "UPDATE {} SET next_run_time = $1, paused = $2, state = $3 WHERE id = $4",
            self.table
        ))
        .bind(to_micros(job.next_run_time))
        .bind(job.status == JobStatus::Paused)
        .bind(state)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::job_not_found(&job.id));
        }
        Ok(())
    }

    async fn delete_job(&self, id: &str) -> SchedulerResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(SchedulerError::job_not_found(id));
        }
        Ok(())
    }

    async fn delete_all_jobs(&self) -> SchedulerResult<()> {
        sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_next_run_time(&self) -> SchedulerResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(&format!(
            "SELECT MIN(next_run_time) AS next_run_time FROM {} WHERE paused = 0",
            self.table
        ))
        .fetch_one(&self.pool)
        .await?;
        let micros: Option<i64> = row.try_get("next_run_time")?;
        Ok(micros.map(from_micros))
    }

    async fn clear(&self) -> SchedulerResult<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
