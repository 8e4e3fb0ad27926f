//! 集群内部 JSON-RPC 入口，监听在节点的 `endpoint` 上

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cadence_cluster::{methods, AppendEntriesArgs, ClusterNode, VoteArgs};
use cadence_core::{Job, Node, RpcRequest, RpcResponse, SchedulerError, SchedulerResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::state::AppState;

fn params<T: DeserializeOwned>(method: &str, value: Value) -> SchedulerResult<T> {
    serde_json::from_value(value)
        .map_err(|e| SchedulerError::InvalidRequest(format!("{method} 参数无效: {e}")))
}

pub async fn cluster_rpc_handler(
    State(state): State<AppState>,
    payload: Result<Json<RpcRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = SchedulerError::InvalidRequest(rejection.body_text());
            return (StatusCode::BAD_REQUEST, Json(RpcResponse::err(&error))).into_response();
        }
    };
    let Some(cluster) = state.cluster.as_deref() else {
        let error = SchedulerError::InvalidRequest("本节点未启用集群".to_string());
        return Json(RpcResponse::err(&error)).into_response();
    };

    let method = request.method.clone();
    match dispatch(cluster, request).await {
        Ok(result) => Json(RpcResponse::ok(result)).into_response(),
        Err(e) => {
            debug!("集群 RPC {} 失败: {}", method, e);
            Json(RpcResponse::err(&e)).into_response()
        }
    }
}

pub async fn dispatch(cluster: &ClusterNode, request: RpcRequest) -> SchedulerResult<Value> {
    let method = request.method.as_str();
    let result = match method {
        methods::REGISTER => {
            serde_json::to_value(cluster.rpc_register(params::<Node>(method, request.params)?))?
        }
        methods::HEARTBEAT => {
            serde_json::to_value(cluster.rpc_heartbeat(params::<Node>(method, request.params)?))?
        }
        methods::REQUEST_VOTE => serde_json::to_value(
            cluster.handle_request_vote(params::<VoteArgs>(method, request.params)?),
        )?,
        methods::APPEND_ENTRIES => serde_json::to_value(
            cluster.handle_append_entries(params::<AppendEntriesArgs>(method, request.params)?),
        )?,
        methods::RUN_JOB => {
            cluster.rpc_run_job(params::<Job>(method, request.params)?).await?;
            Value::Null
        }
        other => {
            return Err(SchedulerError::InvalidRequest(format!("未知的集群方法: {other}")));
        }
    };
    Ok(result)
}
