use cadence_core::Node;
use serde::{Deserialize, Serialize};

/// 集群内部 RPC 方法名
pub mod methods {
    pub const REGISTER: &str = "Cluster.Register";
    pub const HEARTBEAT: &str = "Cluster.Heartbeat";
    pub const RUN_JOB: &str = "Cluster.RunJob";
    pub const REQUEST_VOTE: &str = "Cluster.RequestVote";
    pub const APPEND_ENTRIES: &str = "Cluster.AppendEntries";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteArgs {
    pub term: u64,
    pub candidate: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReply {
    pub term: u64,
    pub granted: bool,
}

/// leader 心跳，不携带日志条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesArgs {
    pub term: u64,
    pub leader: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendEntriesReply {
    pub term: u64,
    pub success: bool,
}

/// 注册与心跳的应答：当前主节点与成员列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipReply {
    pub endpoint_main: String,
    pub nodes: Vec<Node>,
}
