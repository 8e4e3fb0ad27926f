//! 可插拔组件的能力接口：任务存储、记录后端、字节队列与集群分发。

pub mod backend;
pub mod cluster;
pub mod queue;
pub mod store;

pub use backend::*;
pub use cluster::*;
pub use queue::*;
pub use store::*;
