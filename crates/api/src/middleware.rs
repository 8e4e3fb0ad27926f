use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cadence_core::{SchedulerError, AUTH_HEADER};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

const MAX_PROXY_BODY: usize = 16 * 1024 * 1024;

pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

pub fn trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
}

/// 非主节点上的写请求转发给主节点的 HTTP 入口
pub async fn proxy_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() == Method::GET || req.uri().path() == "/health" {
        return next.run(req).await;
    }
    let main = match state.proxy_target() {
        Ok(None) => return next.run(req).await,
        Ok(Some(main)) => main,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let path = req
        .uri()
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let url = format!("http://{}{}", main.endpoint_http, path);
    debug!("转发 {} {} 到主节点 {}", req.method(), path, main.endpoint);
    match forward(&state.proxy, &url, req).await {
        Ok(response) => response,
        Err(e) => {
            warn!("转发到主节点失败: {}", e);
            ApiError::from(e).into_response()
        }
    }
}

/// 转发请求并原样返回状态码与响应体
pub async fn forward(client: &reqwest::Client, url: &str, req: Request) -> Result<Response, SchedulerError> {
    let (parts, body) = req.into_parts();
    let body = to_bytes(body, MAX_PROXY_BODY)
        .await
        .map_err(|e| SchedulerError::Network(format!("读取请求体失败: {e}")))?;
    forward_bytes(client, url, parts.method, &parts.headers, body).await
}

pub async fn forward_bytes(
    client: &reqwest::Client,
    url: &str,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, SchedulerError> {
    let mut builder = client.request(method, url).body(body);
    for name in [CONTENT_TYPE.as_str(), AUTH_HEADER] {
        if let Some(value) = headers.get(name) {
            builder = builder.header(name, value);
        }
    }

    let upstream = builder
        .send()
        .await
        .map_err(|e| SchedulerError::Network(format!("转发到 {url} 失败: {e}")))?;
    let status = upstream.status();
    let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| SchedulerError::Network(format!("读取 {url} 响应失败: {e}")))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    if let Some(content_type) = content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}
