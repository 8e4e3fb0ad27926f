//! 集群成员管理、节点间 RPC 与 HA 主节点选举。

pub mod messages;
pub mod node;
pub mod raft;
pub mod transport;

pub use messages::*;
pub use node::ClusterNode;
pub use raft::RaftRole;
pub use transport::{ClusterTransport, HttpClusterTransport};
