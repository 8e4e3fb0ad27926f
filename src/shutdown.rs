use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// 优雅关闭管理器
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
    triggered: Arc<AtomicBool>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅关闭信号，关闭后返回的令牌立即处于取消状态
    pub fn subscribe(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// 触发关闭，重复调用无副作用
    pub fn shutdown(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            debug!("关闭管理器已经触发过关闭");
            return;
        }
        info!("触发系统关闭");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到Ctrl+C信号"),
        _ = terminate => info!("收到SIGTERM信号"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_cancels_subscribers() {
        let manager = ShutdownManager::new();
        let early = manager.subscribe();
        assert!(!manager.is_shutdown());

        manager.shutdown();
        manager.shutdown();
        assert!(manager.is_shutdown());
        early.cancelled().await;

        let late = manager.subscribe();
        assert!(late.is_cancelled());
    }
}
