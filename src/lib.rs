//! # Cadence
//!
//! 分布式任务调度器的可执行程序装配层。作为库使用时，先向
//! [`cadence_core::FunctionRegistry`] 注册任务函数，再用 [`Application`] 按配置启动。

pub mod app;
pub mod builtin;
pub mod shutdown;

pub use app::Application;
pub use shutdown::{wait_for_shutdown_signal, ShutdownManager};
