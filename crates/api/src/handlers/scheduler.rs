use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::IntoResponse,
    Json,
};
use cadence_core::Job;
use tracing::info;

use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    state::AppState,
};

/// 添加任务
pub async fn add_job(
    State(state): State<AppState>,
    payload: Result<Json<Job>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(job) = payload?;
    let job = state.scheduler.add_job(job).await?;
    info!("通过 HTTP 添加任务 {} ({})", job.name, job.id);
    Ok(success(job))
}

pub async fn get_job(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    Ok(success(state.scheduler.get_job(&id).await?))
}

pub async fn get_all_jobs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.scheduler.get_all_jobs().await?))
}

/// 更新任务，保留原有状态
pub async fn update_job(
    State(state): State<AppState>,
    payload: Result<Json<Job>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(job) = payload?;
    Ok(success(state.scheduler.update_job(job).await?))
}

pub async fn delete_job(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    state.scheduler.delete_job(&id).await?;
    Ok(ApiResponse::empty())
}

pub async fn delete_all_jobs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.scheduler.delete_all_jobs().await?;
    Ok(ApiResponse::empty())
}

pub async fn pause_job(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    Ok(success(state.scheduler.pause_job(&id).await?))
}

pub async fn resume_job(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = path?;
    Ok(success(state.scheduler.resume_job(&id).await?))
}

/// 立即执行一次，不影响调度
pub async fn run_job(
    State(state): State<AppState>,
    payload: Result<Json<Job>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(job) = payload?;
    state.scheduler.run_job(job).await?;
    Ok(ApiResponse::empty())
}

/// 按当前时间重新计算下次执行时间
pub async fn schedule_job(
    State(state): State<AppState>,
    payload: Result<Json<Job>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(job) = payload?;
    Ok(success(state.scheduler.schedule_job(job).await?))
}

pub async fn start(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.scheduler.start();
    Ok(ApiResponse::empty())
}

pub async fn stop(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.scheduler.stop();
    Ok(ApiResponse::empty())
}

pub async fn get_info(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.scheduler.info()))
}
