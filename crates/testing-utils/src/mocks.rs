//! 测试替身

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use cadence_cluster::{
    AppendEntriesArgs, AppendEntriesReply, ClusterNode, ClusterTransport, MembershipReply, VoteArgs,
    VoteReply,
};
use cadence_core::{Job, Node, Queue, SchedulerError, SchedulerResult};

/// 进程内集群传输，直接调用目标节点的处理函数
#[derive(Default)]
pub struct InProcessTransport {
    nodes: Mutex<HashMap<String, Weak<ClusterNode>>>,
    disconnected: Mutex<HashSet<String>>,
    stalled: Mutex<HashMap<String, Duration>>,
}

impl InProcessTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attach(&self, node: &Arc<ClusterNode>) {
        self.nodes
            .lock()
            .unwrap()
            .insert(node.endpoint().to_string(), Arc::downgrade(node));
    }

    /// 模拟节点失联
    pub fn disconnect(&self, endpoint: &str) {
        self.disconnected.lock().unwrap().insert(endpoint.to_string());
    }

    pub fn reconnect(&self, endpoint: &str) {
        self.disconnected.lock().unwrap().remove(endpoint);
    }

    /// 模拟无响应的节点：发往它的选举请求先挂起 `delay` 再失败
    pub fn stall(&self, endpoint: &str, delay: Duration) {
        self.stalled.lock().unwrap().insert(endpoint.to_string(), delay);
    }

    async fn wait_if_stalled(&self, endpoint: &str) -> SchedulerResult<()> {
        let delay = self.stalled.lock().unwrap().get(endpoint).copied();
        match delay {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                Err(SchedulerError::Network(format!("{endpoint} 无响应")))
            }
            None => Ok(()),
        }
    }

    fn target(&self, endpoint: &str) -> SchedulerResult<Arc<ClusterNode>> {
        if self.disconnected.lock().unwrap().contains(endpoint) {
            return Err(SchedulerError::Network(format!("{endpoint} 不可达")));
        }
        self.nodes
            .lock()
            .unwrap()
            .get(endpoint)
            .and_then(Weak::upgrade)
            .ok_or_else(|| SchedulerError::Network(format!("{endpoint} 未连接")))
    }
}

#[async_trait]
impl ClusterTransport for InProcessTransport {
    async fn register(&self, target: &str, node: &Node) -> SchedulerResult<MembershipReply> {
        Ok(self.target(target)?.rpc_register(node.clone()))
    }

    async fn heartbeat(&self, target: &str, node: &Node) -> SchedulerResult<MembershipReply> {
        if self.disconnected.lock().unwrap().contains(&node.endpoint) {
            return Err(SchedulerError::Network(format!("{} 不可达", node.endpoint)));
        }
        Ok(self.target(target)?.rpc_heartbeat(node.clone()))
    }

    async fn request_vote(&self, target: &str, args: &VoteArgs) -> SchedulerResult<VoteReply> {
        if self.disconnected.lock().unwrap().contains(&args.candidate) {
            return Err(SchedulerError::Network(format!("{} 不可达", args.candidate)));
        }
        self.wait_if_stalled(target).await?;
        Ok(self.target(target)?.handle_request_vote(args.clone()))
    }

    async fn append_entries(
        &self,
        target: &str,
        args: &AppendEntriesArgs,
    ) -> SchedulerResult<AppendEntriesReply> {
        if self.disconnected.lock().unwrap().contains(&args.leader) {
            return Err(SchedulerError::Network(format!("{} 不可达", args.leader)));
        }
        self.wait_if_stalled(target).await?;
        Ok(self.target(target)?.handle_append_entries(args.clone()))
    }

    async fn run_job(&self, target: &str, job: &Job) -> SchedulerResult<()> {
        self.target(target)?.rpc_run_job(job.clone()).await
    }
}

/// 拉取总是失败的队列
#[derive(Default)]
pub struct FailingQueue {
    pulls: AtomicUsize,
}

impl FailingQueue {
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Queue for FailingQueue {
    fn kind(&self) -> &'static str {
        "failing"
    }

    async fn init(&self) -> SchedulerResult<()> {
        Ok(())
    }

    async fn push(&self, _payload: Vec<u8>) -> SchedulerResult<()> {
        Err(SchedulerError::Queue("push rejected".to_string()))
    }

    async fn pull(&self) -> SchedulerResult<Option<Vec<u8>>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Err(SchedulerError::Queue("connection refused".to_string()))
    }

    async fn clear(&self) -> SchedulerResult<()> {
        Ok(())
    }
}
