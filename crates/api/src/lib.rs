//! # Cadence API
//!
//! 调度器对外的三个入口：
//!
//! - HTTP 管理接口（`endpoint_http`）：`/scheduler/*`、`/recorder/*`、`/cluster/nodes`、
//!   `/broker/queues` 与 `/health`，响应统一为 `{"data": ..., "error": ""}`
//! - 公共 JSON-RPC（`endpoint_rpc`）：`POST /rpc`，方法名形如 `Scheduler.AddJob`
//! - 集群内部 RPC（`endpoint`）：注册、心跳、选举与远程执行
//!
//! 配置了 `password_sha2` 时所有入口都校验 `Auth-Password-SHA2` 请求头。
//! 集群中的非主节点会把写请求转发给主节点。

pub mod auth;
pub mod cluster_rpc;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::{create_cluster_router, create_http_router, create_rpc_router};
pub use server::spawn_server;
pub use state::AppState;
