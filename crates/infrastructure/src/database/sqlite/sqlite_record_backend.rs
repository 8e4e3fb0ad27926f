use async_trait::async_trait;
use cadence_core::{Backend, Pagination, Record, RecordStatus, SchedulerError, SchedulerResult};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{from_micros, to_micros};
use crate::database::connect_sqlite;

/// SQLite 运行记录后端
pub struct SqliteBackend {
    pool: SqlitePool,
    table: String,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_table(pool, "cadence_records")
    }

    pub fn with_table(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub async fn connect(url: &str) -> SchedulerResult<Self> {
        let backend = Self::new(connect_sqlite(url).await?);
        backend.init().await?;
        Ok(backend)
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> SchedulerResult<Record> {
        let id: i64 = row.try_get("id")?;
        let status: String = row.try_get("status")?;
        Ok(Record {
            id: id as u64,
            job_id: row.try_get("job_id")?,
            job_name: row.try_get("job_name")?,
            status: status.parse()?,
            result: row.try_get("result")?,
            start_at: from_micros(row.try_get("start_at")?),
            end_at: from_micros(row.try_get("end_at")?),
        })
    }

    async fn fetch_page(
        &self,
        job_id: Option<&str>,
        page: Pagination,
    ) -> SchedulerResult<(Vec<Record>, u64)> {
        let filter = if job_id.is_some() { "WHERE job_id = $1" } else { "" };

        let count_sql = format!("SELECT COUNT(*) AS total FROM {} {}", self.table, filter);
        let mut count_query = sqlx::query(&count_sql);
        if let Some(job_id) = job_id {
            count_query = count_query.bind(job_id);
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?.try_get("total")?;

        let (limit_param, offset_param) = if job_id.is_some() { ("$2", "$3") } else { ("$1", "$2") };
        let list_sql = format!(
            "SELECT id, job_id, job_name, status, result, start_at, end_at FROM {} {} \
             ORDER BY start_at DESC, id DESC LIMIT {} OFFSET {}",
            self.table, filter, limit_param, offset_param
        );
        let mut list_query = sqlx::query(&list_sql);
        if let Some(job_id) = job_id {
            list_query = list_query.bind(job_id);
        }
        let rows = list_query
            .bind(page.page_size as i64)
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .iter()
            .map(Self::row_to_record)
            .collect::<SchedulerResult<Vec<_>>>()?;
        Ok((records, total as u64))
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> SchedulerResult<()> {
        debug!("Running SQLite record backend migrations");
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                job_id TEXT NOT NULL,
                job_name TEXT NOT NULL,
                status TEXT NOT NULL,
                result TEXT NOT NULL DEFAULT '',
                start_at INTEGER NOT NULL,
                end_at INTEGER NOT NULL
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_job_start ON {0} (job_id, start_at)",
            self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_metadata(&self, record: &Record) -> SchedulerResult<()> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, job_id, job_name, status, result, start_at, end_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table
        ))
        .bind(record.id as i64)
        .bind(&record.job_id)
        .bind(&record.job_name)
        .bind(record.status.as_str())
        .bind(&record.result)
        .bind(to_micros(record.start_at))
        .bind(to_micros(record.end_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_result(&self, id: u64, status: RecordStatus, result: &str) -> SchedulerResult<()> {
        let updated = sqlx::query(&format!(
            "UPDATE {} SET status = $1, result = $2, end_at = $3 WHERE id = $4",
            self.table
        ))
        .bind(status.as_str())
        .bind(result)
        .bind(to_micros(Utc::now()))
        .bind(id as i64)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(SchedulerError::Backend(format!("运行记录不存在: {id}")));
        }
        Ok(())
    }

    async fn get_records(&self, job_id: &str, page: Pagination) -> SchedulerResult<(Vec<Record>, u64)> {
        self.fetch_page(Some(job_id), page).await
    }

    async fn get_all_records(&self, page: Pagination) -> SchedulerResult<(Vec<Record>, u64)> {
        self.fetch_page(None, page).await
    }

    async fn delete_records(&self, job_id: &str) -> SchedulerResult<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE job_id = $1", self.table))
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_records(&self) -> SchedulerResult<()> {
        sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> SchedulerResult<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
