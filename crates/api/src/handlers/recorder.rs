use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
};

use super::PageQuery;
use crate::{
    error::ApiResult,
    response::{success, ApiResponse},
    state::AppState,
};

/// 分页获取某个任务的执行记录
pub async fn get_records(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(job_id) = path?;
    let Query(query) = query?;
    let page = state
        .scheduler
        .get_records(&job_id, query.page(), query.page_size())
        .await?;
    Ok(success(page))
}

/// 分页获取全部执行记录
pub async fn get_all_records(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query?;
    let page = state
        .scheduler
        .get_all_records(query.page(), query.page_size())
        .await?;
    Ok(success(page))
}

pub async fn delete_records(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(job_id) = path?;
    state.scheduler.delete_records(&job_id).await?;
    Ok(ApiResponse::empty())
}

pub async fn delete_all_records(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.scheduler.delete_all_records().await?;
    Ok(ApiResponse::empty())
}
