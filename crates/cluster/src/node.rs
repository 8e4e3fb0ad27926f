use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use cadence_core::{
    ClusterConfig, ClusterDispatch, DispatchTarget, Job, Node, SchedulerError, SchedulerResult,
    VERSION,
};
use cadence_dispatcher::Scheduler;
use chrono::Utc;
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::messages::MembershipReply;
use crate::raft::RaftState;
use crate::transport::ClusterTransport;

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// 集群节点
///
/// 维护成员列表与主节点地址，非主节点定期向主节点发送心跳，
/// 主节点检查成员健康度。HA 模式下主节点由选举产生。
pub struct ClusterNode {
    pub(crate) config: ClusterConfig,
    pub(crate) local: Node,
    pub(crate) endpoint_main: RwLock<String>,
    nodes: RwLock<HashMap<String, Node>>,
    pub(crate) scheduler: Scheduler,
    pub(crate) transport: Arc<dyn ClusterTransport>,
    pub(crate) raft: Option<RaftState>,
    cancel: CancellationToken,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ClusterNode {
    /// 创建节点并把集群分发绑定到调度器
    pub fn new(
        config: ClusterConfig,
        endpoint_rpc: impl Into<String>,
        endpoint_http: impl Into<String>,
        scheduler: Scheduler,
        transport: Arc<dyn ClusterTransport>,
    ) -> SchedulerResult<Arc<Self>> {
        let now = Utc::now();
        let endpoint_main = if config.endpoint_main.is_empty() {
            config.endpoint.clone()
        } else {
            config.endpoint_main.clone()
        };
        let local = Node {
            endpoint: config.endpoint.clone(),
            endpoint_main: endpoint_main.clone(),
            endpoint_rpc: endpoint_rpc.into(),
            endpoint_http: endpoint_http.into(),
            queue: config.queue.clone(),
            mode: config.mode,
            version: VERSION.to_string(),
            health: true,
            register_time: now,
            last_heartbeat_time: now,
        };
        let raft = config.mode.is_ha().then(RaftState::new);
        // HA 节点的主节点由选举确定
        let initial_main = if raft.is_some() { String::new() } else { endpoint_main };

        let node = Arc::new(Self {
            config,
            local,
            endpoint_main: RwLock::new(initial_main),
            nodes: RwLock::new(HashMap::new()),
            scheduler,
            transport,
            raft,
            cancel: CancellationToken::new(),
        });
        node.upsert(node.local.clone());
        node.scheduler
            .bind_cluster(Arc::new(ClusterHandle(Arc::downgrade(&node))))?;
        Ok(node)
    }

    pub fn endpoint(&self) -> &str {
        &self.local.endpoint
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn endpoint_main(&self) -> String {
        read(&self.endpoint_main).clone()
    }

    pub(crate) fn set_endpoint_main(&self, endpoint: &str) {
        let mut main = write(&self.endpoint_main);
        if *main != endpoint {
            info!("主节点变更: '{}' -> '{}'", *main, endpoint);
            *main = endpoint.to_string();
        }
    }

    pub fn is_main_node(&self) -> bool {
        *read(&self.endpoint_main) == self.local.endpoint
    }

    /// 当前成员列表，按 endpoint 排序
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = read(&self.nodes).values().cloned().collect();
        nodes.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        nodes
    }

    pub fn main_node(&self) -> Option<Node> {
        let main = self.endpoint_main();
        if main.is_empty() {
            return None;
        }
        read(&self.nodes).get(&main).cloned()
    }

    /// 其他 HA 节点的 endpoint
    pub(crate) fn ha_peers(&self) -> Vec<String> {
        read(&self.nodes)
            .values()
            .filter(|n| n.mode.is_ha() && n.endpoint != self.local.endpoint)
            .map(|n| n.endpoint.clone())
            .collect()
    }

    pub(crate) fn upsert(&self, mut node: Node) {
        let now = Utc::now();
        let mut nodes = write(&self.nodes);
        if let Some(existing) = nodes.get(&node.endpoint) {
            node.register_time = existing.register_time;
        }
        node.last_heartbeat_time = now;
        node.health = true;
        nodes.insert(node.endpoint.clone(), node);
    }

    fn membership(&self) -> MembershipReply {
        MembershipReply {
            endpoint_main: self.endpoint_main(),
            nodes: self.nodes(),
        }
    }

    fn merge_membership(&self, reply: MembershipReply) {
        {
            let mut nodes = write(&self.nodes);
            for node in reply.nodes {
                if node.endpoint == self.local.endpoint {
                    continue;
                }
                nodes.insert(node.endpoint.clone(), node);
            }
        }
        if self.raft.is_none() && !reply.endpoint_main.is_empty() {
            self.set_endpoint_main(&reply.endpoint_main);
        }
    }

    /// 在健康且服务于任务队列的节点中随机挑选一个
    pub fn choose_node(&self, queues: &[String]) -> SchedulerResult<Node> {
        let candidates: Vec<Node> = read(&self.nodes)
            .values()
            .filter(|n| n.health && n.serves_any(queues))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(SchedulerError::QueueNotFound(format!(
                "没有服务于队列 {queues:?} 的健康节点"
            )));
        }
        let index = rand::rng().random_range(0..candidates.len());
        Ok(candidates[index].clone())
    }

    /// 处理注册请求
    pub fn rpc_register(&self, node: Node) -> MembershipReply {
        info!("节点注册: {} (queue={}, mode={:?})", node.endpoint, node.queue, node.mode);
        self.upsert(node);
        self.membership()
    }

    /// 处理心跳请求
    pub fn rpc_heartbeat(&self, node: Node) -> MembershipReply {
        debug!("收到心跳: {}", node.endpoint);
        self.upsert(node);
        self.membership()
    }

    /// 执行其他节点分发过来的触发
    pub async fn rpc_run_job(&self, job: Job) -> SchedulerResult<()> {
        debug!("执行远端分发的任务 {}", job.id);
        self.scheduler.dispatch_local(job).await
    }

    /// 加入集群并启动后台循环
    pub async fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        let main = self.config.endpoint_main.clone();
        if !main.is_empty() && main != self.local.endpoint {
            match self.transport.register(&main, &self.local).await {
                Ok(reply) => {
                    self.merge_membership(reply);
                    info!("已加入集群，主节点 {}", main);
                }
                Err(e) if self.raft.is_some() => {
                    warn!("向 {} 注册失败，等待选举: {}", main, e);
                }
                Err(e) => return Err(e),
            }
        }

        tokio::spawn(Arc::clone(self).heartbeat_loop(self.cancel.child_token()));
        tokio::spawn(Arc::clone(self).health_check_loop(self.cancel.child_token()));
        if self.raft.is_some() {
            tokio::spawn(Arc::clone(self).raft_loop(self.cancel.child_token()));
        }
        info!(
            "集群节点已启动: {} mode={:?} queue={}",
            self.local.endpoint, self.local.mode, self.local.queue
        );
        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        if self.raft.is_some() {
            self.scheduler.stop();
        }
        info!("集群节点已停止: {}", self.local.endpoint);
    }

    fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.config.heartbeat_interval_ms.max(1))
    }

    async fn heartbeat_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.heartbeat_interval());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let main = self.endpoint_main();
            if main.is_empty() || main == self.local.endpoint {
                continue;
            }
            let mut local = self.local.clone();
            local.endpoint_main = main.clone();
            match self.transport.heartbeat(&main, &local).await {
                Ok(reply) => self.merge_membership(reply),
                Err(e) => warn!("向主节点 {} 发送心跳失败: {}", main, e),
            }
        }
        debug!("心跳循环退出");
    }

    async fn health_check_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if self.is_main_node() {
                self.check_health();
            }
        }
        debug!("健康检查循环退出");
    }

    /// 标记心跳超时的节点，驱逐长期失联的非 HA 节点
    pub(crate) fn check_health(&self) {
        let now = Utc::now();
        let stale_after = chrono::Duration::milliseconds((self.config.heartbeat_interval_ms * 2) as i64);
        let evict_after = chrono::Duration::seconds(self.config.eviction_after_secs as i64);

        let mut nodes = write(&self.nodes);
        if let Some(me) = nodes.get_mut(&self.local.endpoint) {
            me.last_heartbeat_time = now;
            me.health = true;
        }
        nodes.retain(|endpoint, node| {
            if node.is_fresh(now, stale_after) {
                return true;
            }
            if node.health {
                warn!("节点 {} 心跳超时，标记为不健康", endpoint);
                node.health = false;
            }
            if !node.mode.is_ha() && !node.is_fresh(now, evict_after) {
                info!("驱逐失联节点 {}", endpoint);
                return false;
            }
            true
        });
    }
}

/// 调度器持有的弱引用，避免与节点互相持有
struct ClusterHandle(Weak<ClusterNode>);

#[async_trait]
impl ClusterDispatch for ClusterHandle {
    fn is_main_node(&self) -> bool {
        self.0.upgrade().map(|n| n.is_main_node()).unwrap_or(false)
    }

    fn main_endpoint(&self) -> Option<String> {
        self.0
            .upgrade()
            .map(|n| n.endpoint_main())
            .filter(|e| !e.is_empty())
    }

    async fn dispatch(&self, job: &Job) -> SchedulerResult<DispatchTarget> {
        let node = self
            .0
            .upgrade()
            .ok_or_else(|| SchedulerError::Internal("集群节点已释放".to_string()))?;
        let target = node.choose_node(&job.queues)?;
        if target.endpoint == node.local.endpoint {
            return Ok(DispatchTarget::Local);
        }
        node.transport.run_job(&target.endpoint, job).await?;
        Ok(DispatchTarget::Remote {
            endpoint: target.endpoint,
        })
    }
}
