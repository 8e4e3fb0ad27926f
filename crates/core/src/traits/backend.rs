use async_trait::async_trait;

use crate::{
    models::{Pagination, Record, RecordStatus},
    SchedulerResult,
};

/// 运行记录后端抽象接口
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn init(&self) -> SchedulerResult<()>;

    /// 写入开始记录
    async fn record_metadata(&self, record: &Record) -> SchedulerResult<()>;

    /// 写入终态与结果，`end_at` 取当前时间
    async fn record_result(&self, id: u64, status: RecordStatus, result: &str) -> SchedulerResult<()>;

    /// 按任务分页查询，按 `start_at` 降序，返回 (记录, 总数)
    async fn get_records(&self, job_id: &str, page: Pagination) -> SchedulerResult<(Vec<Record>, u64)>;

    async fn get_all_records(&self, page: Pagination) -> SchedulerResult<(Vec<Record>, u64)>;

    async fn delete_records(&self, job_id: &str) -> SchedulerResult<()>;

    async fn delete_all_records(&self) -> SchedulerResult<()>;

    /// 删除底层存储
    async fn clear(&self) -> SchedulerResult<()>;
}
