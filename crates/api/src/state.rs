use std::sync::Arc;
use std::time::Duration;

use cadence_cluster::ClusterNode;
use cadence_core::{SchedulerError, SchedulerResult};
use cadence_dispatcher::Scheduler;

/// 各个 HTTP/RPC 入口共享的状态
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub cluster: Option<Arc<ClusterNode>>,
    /// 小写十六进制的密码摘要
    pub password_sha2: Option<Arc<str>>,
    pub proxy: reqwest::Client,
}

impl AppState {
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler,
            cluster: None,
            password_sha2: None,
            proxy: reqwest::Client::new(),
        }
    }

    pub fn with_cluster(mut self, cluster: Arc<ClusterNode>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    pub fn with_password_sha2(mut self, digest: Option<String>) -> Self {
        self.password_sha2 = digest
            .filter(|d| !d.is_empty())
            .map(|d| Arc::from(d.to_ascii_lowercase()));
        self
    }

    pub fn with_proxy_timeout(mut self, timeout: Duration) -> SchedulerResult<Self> {
        self.proxy = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::Network(format!("创建代理客户端失败: {e}")))?;
        Ok(self)
    }

    /// 本节点不是主节点时返回需要转发到的主节点
    pub fn proxy_target(&self) -> SchedulerResult<Option<cadence_core::Node>> {
        let Some(cluster) = &self.cluster else {
            return Ok(None);
        };
        if cluster.is_main_node() {
            return Ok(None);
        }
        cluster.main_node().map(Some).ok_or(SchedulerError::NoLeader)
    }
}
