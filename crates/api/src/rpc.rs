//! 公共 JSON-RPC 入口：`POST /rpc`
//!
//! 请求体为 `{"method": "Scheduler.AddJob", "params": {...}}`，
//! 应答为 [`RpcResponse`]。非主节点上的写方法会转发给主节点。

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use cadence_core::{Job, RpcRequest, RpcResponse, SchedulerError, SchedulerResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::handlers::cluster::node_map;
use crate::middleware::forward_bytes;
use crate::state::AppState;

pub mod methods {
    pub const ADD_JOB: &str = "Scheduler.AddJob";
    pub const GET_JOB: &str = "Scheduler.GetJob";
    pub const GET_ALL_JOBS: &str = "Scheduler.GetAllJobs";
    pub const UPDATE_JOB: &str = "Scheduler.UpdateJob";
    pub const DELETE_JOB: &str = "Scheduler.DeleteJob";
    pub const DELETE_ALL_JOBS: &str = "Scheduler.DeleteAllJobs";
    pub const PAUSE_JOB: &str = "Scheduler.PauseJob";
    pub const RESUME_JOB: &str = "Scheduler.ResumeJob";
    pub const RUN_JOB: &str = "Scheduler.RunJob";
    pub const SCHEDULE_JOB: &str = "Scheduler.ScheduleJob";
    pub const START: &str = "Scheduler.Start";
    pub const STOP: &str = "Scheduler.Stop";
    pub const INFO: &str = "Scheduler.Info";
    pub const GET_RECORDS: &str = "Recorder.GetRecords";
    pub const GET_ALL_RECORDS: &str = "Recorder.GetAllRecords";
    pub const DELETE_RECORDS: &str = "Recorder.DeleteRecords";
    pub const DELETE_ALL_RECORDS: &str = "Recorder.DeleteAllRecords";
    pub const GET_NODES: &str = "Cluster.GetNodes";
    pub const GET_QUEUES: &str = "Broker.GetQueues";
}

/// 会修改状态的方法，集群模式下只在主节点执行
pub fn is_mutating(method: &str) -> bool {
    matches!(
        method,
        methods::ADD_JOB
            | methods::UPDATE_JOB
            | methods::DELETE_JOB
            | methods::DELETE_ALL_JOBS
            | methods::PAUSE_JOB
            | methods::RESUME_JOB
            | methods::RUN_JOB
            | methods::SCHEDULE_JOB
            | methods::START
            | methods::STOP
            | methods::DELETE_RECORDS
            | methods::DELETE_ALL_RECORDS
    )
}

#[derive(Debug, Deserialize)]
struct IdParams {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecordParams {
    #[serde(default)]
    job_id: String,
    page: Option<i64>,
    page_size: Option<i64>,
}

fn params<T: DeserializeOwned>(method: &str, value: Value) -> SchedulerResult<T> {
    // 省略 params 时按空对象处理
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| SchedulerError::InvalidRequest(format!("{method} 参数无效: {e}")))
}

fn to_value<T: serde::Serialize>(value: T) -> SchedulerResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub async fn rpc_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = SchedulerError::InvalidRequest(format!("RPC 请求体无效: {e}"));
            return (StatusCode::BAD_REQUEST, Json(RpcResponse::err(&error))).into_response();
        }
    };

    if is_mutating(&request.method) {
        match state.proxy_target() {
            Ok(None) => {}
            Ok(Some(main)) => {
                let url = format!("http://{}/rpc", main.endpoint_rpc);
                debug!("转发 {} 到主节点 {}", request.method, main.endpoint);
                return match forward_bytes(&state.proxy, &url, Method::POST, &headers, body).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!("转发 {} 失败: {}", request.method, e);
                        Json(RpcResponse::err(&e)).into_response()
                    }
                };
            }
            Err(e) => return Json(RpcResponse::err(&e)).into_response(),
        }
    }

    let method = request.method.clone();
    match dispatch(&state, request).await {
        Ok(result) => Json(RpcResponse::ok(result)).into_response(),
        Err(e) => {
            debug!("RPC {} 失败: {}", method, e);
            Json(RpcResponse::err(&e)).into_response()
        }
    }
}

/// 在本节点执行一个 RPC 方法
pub async fn dispatch(state: &AppState, request: RpcRequest) -> SchedulerResult<Value> {
    let scheduler = &state.scheduler;
    let method = request.method.as_str();
    match method {
        methods::ADD_JOB => to_value(scheduler.add_job(params::<Job>(method, request.params)?).await?),
        methods::GET_JOB => {
            let p: IdParams = params(method, request.params)?;
            to_value(scheduler.get_job(&p.id).await?)
        }
        methods::GET_ALL_JOBS => to_value(scheduler.get_all_jobs().await?),
        methods::UPDATE_JOB => to_value(scheduler.update_job(params::<Job>(method, request.params)?).await?),
        methods::DELETE_JOB => {
            let p: IdParams = params(method, request.params)?;
            scheduler.delete_job(&p.id).await?;
            Ok(Value::Null)
        }
        methods::DELETE_ALL_JOBS => {
            scheduler.delete_all_jobs().await?;
            Ok(Value::Null)
        }
        methods::PAUSE_JOB => {
            let p: IdParams = params(method, request.params)?;
            to_value(scheduler.pause_job(&p.id).await?)
        }
        methods::RESUME_JOB => {
            let p: IdParams = params(method, request.params)?;
            to_value(scheduler.resume_job(&p.id).await?)
        }
        methods::RUN_JOB => {
            scheduler.run_job(params::<Job>(method, request.params)?).await?;
            Ok(Value::Null)
        }
        methods::SCHEDULE_JOB => {
            to_value(scheduler.schedule_job(params::<Job>(method, request.params)?).await?)
        }
        methods::START => {
            scheduler.start();
            Ok(Value::Null)
        }
        methods::STOP => {
            scheduler.stop();
            Ok(Value::Null)
        }
        methods::INFO => to_value(scheduler.info()),
        methods::GET_RECORDS => {
            let p: RecordParams = params(method, request.params)?;
            let page = scheduler
                .get_records(&p.job_id, p.page.unwrap_or(1), p.page_size.unwrap_or(10))
                .await?;
            to_value(page)
        }
        methods::GET_ALL_RECORDS => {
            let p: RecordParams = params(method, request.params)?;
            let page = scheduler
                .get_all_records(p.page.unwrap_or(1), p.page_size.unwrap_or(10))
                .await?;
            to_value(page)
        }
        methods::DELETE_RECORDS => {
            let p: RecordParams = params(method, request.params)?;
            scheduler.delete_records(&p.job_id).await?;
            Ok(Value::Null)
        }
        methods::DELETE_ALL_RECORDS => {
            scheduler.delete_all_records().await?;
            Ok(Value::Null)
        }
        methods::GET_NODES => to_value(node_map(state)),
        methods::GET_QUEUES => to_value(scheduler.get_queues().await),
        other => Err(SchedulerError::InvalidRequest(format!("未知的方法: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutating_methods() {
        assert!(is_mutating(methods::ADD_JOB));
        assert!(is_mutating(methods::DELETE_ALL_RECORDS));
        assert!(!is_mutating(methods::GET_JOB));
        assert!(!is_mutating(methods::INFO));
        assert!(!is_mutating(methods::GET_NODES));
        assert!(!is_mutating("Scheduler.Unknown"));
    }

    #[test]
    fn test_record_params_defaults() {
        let p: RecordParams = params(methods::GET_ALL_RECORDS, Value::Null).unwrap();
        assert_eq!(p.job_id, "");
        assert!(p.page.is_none());

        let err = params::<IdParams>(methods::GET_JOB, serde_json::json!({"name": 1})).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidRequest(_)));
    }
}
