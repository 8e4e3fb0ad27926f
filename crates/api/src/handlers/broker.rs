use axum::{extract::State, response::IntoResponse};

use crate::{error::ApiResult, response::success, state::AppState};

/// 获取队列列表
pub async fn get_queues(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.scheduler.get_queues().await))
}
