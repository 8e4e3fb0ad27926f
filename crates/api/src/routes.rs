use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::auth::auth_middleware;
use crate::cluster_rpc::cluster_rpc_handler;
use crate::handlers::{broker, cluster, health::health_check, recorder, scheduler};
use crate::middleware::{cors_layer, proxy_middleware, trace_layer};
use crate::rpc::rpc_handler;
use crate::state::AppState;

/// 创建 HTTP 管理接口路由
pub fn create_http_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // 任务管理
        .route(
            "/scheduler/job",
            post(scheduler::add_job).put(scheduler::update_job),
        )
        .route("/scheduler/job/run", post(scheduler::run_job))
        .route("/scheduler/job/schedule", post(scheduler::schedule_job))
        .route(
            "/scheduler/job/{id}",
            get(scheduler::get_job).delete(scheduler::delete_job),
        )
        .route("/scheduler/job/{id}/pause", post(scheduler::pause_job))
        .route("/scheduler/job/{id}/resume", post(scheduler::resume_job))
        .route(
            "/scheduler/jobs",
            get(scheduler::get_all_jobs).delete(scheduler::delete_all_jobs),
        )
        .route("/scheduler/start", post(scheduler::start))
        .route("/scheduler/stop", post(scheduler::stop))
        .route("/scheduler/info", get(scheduler::get_info))
        // 执行记录
        .route(
            "/recorder/records",
            get(recorder::get_all_records).delete(recorder::delete_all_records),
        )
        .route(
            "/recorder/records/{job_id}",
            get(recorder::get_records).delete(recorder::delete_records),
        )
        // 集群与队列
        .route("/cluster/nodes", get(cluster::get_nodes))
        .route("/broker/queues", get(broker::get_queues))
        // 先认证再转发
        .layer(from_fn_with_state(state.clone(), proxy_middleware))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(cors_layer())
        .layer(trace_layer())
        .with_state(state)
}

/// 创建公共 JSON-RPC 路由
pub fn create_rpc_router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(rpc_handler))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(trace_layer())
        .with_state(state)
}

/// 创建集群内部 RPC 路由
pub fn create_cluster_router(state: AppState) -> Router {
    Router::new()
        .route("/rpc", post(cluster_rpc_handler))
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(trace_layer())
        .with_state(state)
}
