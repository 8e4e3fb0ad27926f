use async_trait::async_trait;

use crate::{models::Job, SchedulerResult};

/// 集群分发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// 选中本节点，由调用方在本地执行
    Local,
    /// 已通过 RPC 交给远端节点
    Remote { endpoint: String },
}

/// 调度器对集群的依赖
#[async_trait]
pub trait ClusterDispatch: Send + Sync {
    /// 本节点是否为主节点（HA 模式下即 leader）
    fn is_main_node(&self) -> bool;

    fn main_endpoint(&self) -> Option<String>;

    /// 按任务队列挑选健康节点并交付一次触发
    async fn dispatch(&self, job: &Job) -> SchedulerResult<DispatchTarget>;
}
