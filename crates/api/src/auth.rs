use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cadence_core::{SchedulerError, AUTH_HEADER};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// 计算密码的 SHA-256 十六进制摘要
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn verify_digest(expected: &str, provided: Option<&str>) -> bool {
    match provided {
        Some(provided) => constant_time_eq(
            expected.as_bytes(),
            provided.trim().to_ascii_lowercase().as_bytes(),
        ),
        None => false,
    }
}

/// 校验 `Auth-Password-SHA2` 请求头，`/health` 免校验
pub async fn auth_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.password_sha2.as_deref() else {
        return next.run(req).await;
    };
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let provided = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok());
    if verify_digest(expected, provided) {
        next.run(req).await
    } else {
        warn!("认证失败: {} {}", req.method(), req.uri());
        ApiError::Scheduler(SchedulerError::Unauthorized).into_response()
    }
}
