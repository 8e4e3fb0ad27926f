use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{models::Job, SchedulerResult};

/// 任务存储抽象接口
///
/// 同一存储上的所有操作相互可串行化，实现可以依赖锁或数据库事务。
#[async_trait]
pub trait Store: Send + Sync {
    /// 驱动名称
    fn name(&self) -> &'static str;

    /// 初始化表结构等资源，可重复调用
    async fn init(&self) -> SchedulerResult<()>;

    /// 持久化新任务，ID 重复时返回 `DuplicateJob`
    async fn add_job(&self, job: &Job) -> SchedulerResult<()>;

    async fn get_job(&self, id: &str) -> SchedulerResult<Job>;

    /// 返回全部任务，不保证顺序
    async fn get_all_jobs(&self) -> SchedulerResult<Vec<Job>>;

    /// 按 ID 整体替换，`next_run_time` 取自传入任务
    async fn update_job(&self, job: &Job) -> SchedulerResult<()>;

    async fn delete_job(&self, id: &str) -> SchedulerResult<()>;

    async fn delete_all_jobs(&self) -> SchedulerResult<()>;

    /// 所有未暂停任务中最早的 `next_run_time`，为空时返回 `None`
    async fn get_next_run_time(&self) -> SchedulerResult<Option<DateTime<Utc>>>;

    /// 释放底层资源
    async fn clear(&self) -> SchedulerResult<()>;
}
