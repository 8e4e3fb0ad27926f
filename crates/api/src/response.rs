use axum::{response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP 响应信封，失败时 `data` 为空、`error` 为错误信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: String::new(),
        }
    }
}

impl ApiResponse<Value> {
    pub fn empty() -> Self {
        Self {
            data: None,
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: error.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

pub fn success<T: Serialize>(data: T) -> ApiResponse<T> {
    ApiResponse::success(data)
}
