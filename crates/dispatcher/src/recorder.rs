use std::sync::Arc;

use cadence_core::{
    Backend, Job, Pagination, Record, RecordPage, RecordStatus, RunIdGenerator, SchedulerResult,
};
use tokio::sync::RwLock;
use tracing::debug;

/// 运行记录器
///
/// 为每次触发分配运行 ID 并写入后端。写操作持有写锁，查询持有读锁，
/// 同一进程内的并发写不会交错。
pub struct Recorder {
    backend: Arc<dyn Backend>,
    ids: RunIdGenerator,
    lock: RwLock<()>,
}

impl Recorder {
    pub fn new(backend: Arc<dyn Backend>, ids: RunIdGenerator) -> Self {
        Self {
            backend,
            ids,
            lock: RwLock::new(()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn init(&self) -> SchedulerResult<()> {
        self.backend.init().await
    }

    /// 写入 running 状态的记录，返回新的运行 ID
    pub async fn record_metadata(&self, job: &Job) -> SchedulerResult<u64> {
        let _guard = self.lock.write().await;
        let id = self.ids.next_id();
        let record = Record::started(id, &job.id, &job.name);
        self.backend.record_metadata(&record).await?;
        debug!("记录运行元数据 run_id={} job_id={}", id, job.id);
        Ok(id)
    }

    pub async fn record_result(&self, id: u64, status: RecordStatus, result: &str) -> SchedulerResult<()> {
        let _guard = self.lock.write().await;
        self.backend.record_result(id, status, result).await
    }

    pub async fn get_records(&self, job_id: &str, page: i64, page_size: i64) -> SchedulerResult<RecordPage> {
        let pagination = Pagination::new(page, page_size);
        let _guard = self.lock.read().await;
        let (records, total) = self.backend.get_records(job_id, pagination).await?;
        Ok(RecordPage {
            records,
            page: pagination.page,
            page_size: pagination.page_size,
            total,
        })
    }

    pub async fn get_all_records(&self, page: i64, page_size: i64) -> SchedulerResult<RecordPage> {
        let pagination = Pagination::new(page, page_size);
        let _guard = self.lock.read().await;
        let (records, total) = self.backend.get_all_records(pagination).await?;
        Ok(RecordPage {
            records,
            page: pagination.page,
            page_size: pagination.page_size,
            total,
        })
    }

    pub async fn delete_records(&self, job_id: &str) -> SchedulerResult<()> {
        let _guard = self.lock.write().await;
        self.backend.delete_records(job_id).await
    }

    pub async fn delete_all_records(&self) -> SchedulerResult<()> {
        let _guard = self.lock.write().await;
        self.backend.delete_all_records().await
    }

    pub async fn clear(&self) -> SchedulerResult<()> {
        let _guard = self.lock.write().await;
        self.backend.clear().await
    }
}
