//! # Cadence Testing Utils
//!
//! 跨 crate 共享的测试工具：示例任务函数、内存调度器构建、
//! 进程内集群传输与故障队列。
//!
//! ```toml
//! [dev-dependencies]
//! cadence-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
