use std::time::Duration;

use async_trait::async_trait;
use cadence_core::{Job, Node, RpcRequest, RpcResponse, SchedulerError, SchedulerResult, AUTH_HEADER};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::messages::{
    methods, AppendEntriesArgs, AppendEntriesReply, MembershipReply, VoteArgs, VoteReply,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// 节点间通信接口
#[async_trait]
pub trait ClusterTransport: Send + Sync {
    async fn register(&self, target: &str, node: &Node) -> SchedulerResult<MembershipReply>;

    async fn heartbeat(&self, target: &str, node: &Node) -> SchedulerResult<MembershipReply>;

    async fn request_vote(&self, target: &str, args: &VoteArgs) -> SchedulerResult<VoteReply>;

    async fn append_entries(
        &self,
        target: &str,
        args: &AppendEntriesArgs,
    ) -> SchedulerResult<AppendEntriesReply>;

    /// 要求目标节点执行一次触发
    async fn run_job(&self, target: &str, job: &Job) -> SchedulerResult<()>;
}

/// 基于 HTTP 的 JSON-RPC 传输，请求发往 `http://{endpoint}/rpc`
pub struct HttpClusterTransport {
    client: reqwest::Client,
    password_sha2: Option<String>,
}

impl HttpClusterTransport {
    pub fn new(password_sha2: Option<String>) -> SchedulerResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SchedulerError::Network(format!("创建 HTTP 客户端失败: {e}")))?;
        Ok(Self {
            client,
            password_sha2,
        })
    }

    async fn call<P, R>(&self, target: &str, method: &str, params: &P, timeout: Duration) -> SchedulerResult<R>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("http://{target}/rpc");
        let request = RpcRequest::new(method, serde_json::to_value(params)?);
        let mut builder = self.client.post(&url).timeout(timeout).json(&request);
        if let Some(digest) = &self.password_sha2 {
            builder = builder.header(AUTH_HEADER, digest);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SchedulerError::Network(format!("{method} -> {target}: {e}")))?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SchedulerError::Unauthorized);
        }
        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|e| SchedulerError::Network(format!("{method} -> {target} 响应无效: {e}")))?;
        let value = envelope.into_result()?;
        debug!("{} -> {} 完成", method, target);
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl ClusterTransport for HttpClusterTransport {
    async fn register(&self, target: &str, node: &Node) -> SchedulerResult<MembershipReply> {
        self.call(target, methods::REGISTER, node, REQUEST_TIMEOUT).await
    }

    async fn heartbeat(&self, target: &str, node: &Node) -> SchedulerResult<MembershipReply> {
        self.call(target, methods::HEARTBEAT, node, HEARTBEAT_TIMEOUT).await
    }

    async fn request_vote(&self, target: &str, args: &VoteArgs) -> SchedulerResult<VoteReply> {
        self.call(target, methods::REQUEST_VOTE, args, HEARTBEAT_TIMEOUT).await
    }

    async fn append_entries(
        &self,
        target: &str,
        args: &AppendEntriesArgs,
    ) -> SchedulerResult<AppendEntriesReply> {
        self.call(target, methods::APPEND_ENTRIES, args, HEARTBEAT_TIMEOUT).await
    }

    async fn run_job(&self, target: &str, job: &Job) -> SchedulerResult<()> {
        let _: serde_json::Value = self.call(target, methods::RUN_JOB, job, REQUEST_TIMEOUT).await?;
        Ok(())
    }
}
