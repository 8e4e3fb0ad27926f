use async_trait::async_trait;

use crate::SchedulerResult;

/// 字节队列抽象接口
#[async_trait]
pub trait Queue: Send + Sync {
    /// 驱动类型，如 `memory`、`redis`
    fn kind(&self) -> &'static str;

    /// 建立订阅，可重复调用
    async fn init(&self) -> SchedulerResult<()>;

    /// 推送一条负载，可能阻塞
    async fn push(&self, payload: Vec<u8>) -> SchedulerResult<()>;

    /// 拉取下一条负载，队列被 `clear` 后返回 `None`
    async fn pull(&self) -> SchedulerResult<Option<Vec<u8>>>;

    /// 队列深度，不支持时返回 -1
    async fn count(&self) -> SchedulerResult<i64> {
        Ok(-1)
    }

    /// 释放订阅与资源
    async fn clear(&self) -> SchedulerResult<()>;
}
