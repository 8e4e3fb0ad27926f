use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use cadence_core::SchedulerError;
use tracing::{debug, warn};

use crate::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // 业务错误以 200 返回，只有畸形输入与认证失败使用错误状态码
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Scheduler(SchedulerError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Scheduler(_) => StatusCode::OK,
        };
        if status == StatusCode::OK {
            debug!("请求处理失败: {}", self);
        } else {
            warn!("请求被拒绝 ({}): {}", status, self);
        }
        (status, ApiResponse::failure(self.to_string())).into_response()
    }
}
