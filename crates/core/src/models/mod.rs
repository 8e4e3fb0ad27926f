//! # 数据模型
//!
//! 调度系统的核心数据结构：任务 [`Job`]、运行记录 [`Record`]、集群节点 [`Node`]、
//! 生命周期事件 [`Event`] 以及 JSON-RPC 信封。
//!
//! 所有时间字段统一使用 `DateTime<Utc>`，在线路上以 RFC-3339 表示；
//! 时长字段以 Go 风格字符串表示（如 `"2s"`），反序列化时也接受纳秒整数。

pub mod event;
pub mod job;
pub mod node;
pub mod record;
pub mod rpc;

pub use event::*;
pub use job::*;
pub use node::*;
pub use record::*;
pub use rpc::*;
