use std::net::SocketAddr;

use axum::Router;
use cadence_core::{SchedulerError, SchedulerResult};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// 绑定地址并在后台提供服务，取消令牌触发后优雅退出
///
/// 返回实际监听的地址，绑定端口 0 时可用于获取分配的端口。
pub async fn spawn_server(
    name: &'static str,
    addr: &str,
    router: Router,
    cancel: CancellationToken,
) -> SchedulerResult<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SchedulerError::Network(format!("{name} 绑定 {addr} 失败: {e}")))?;
    let local = listener
        .local_addr()
        .map_err(|e| SchedulerError::Network(format!("{name} 获取监听地址失败: {e}")))?;
    info!("{} 监听于 {}", name, local);

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await;
        match result {
            Ok(()) => info!("{} 已停止", name),
            Err(e) => error!("{} 异常退出: {}", name, e),
        }
    });
    Ok((local, handle))
}
