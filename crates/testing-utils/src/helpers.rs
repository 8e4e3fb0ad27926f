use std::sync::Once;

use cadence_core::{ClusterConfig, NodeMode, RaftConfig};

static INIT: Once = Once::new();

/// 初始化测试日志，重复调用无副作用
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// 测试集群节点配置
pub fn cluster_config(endpoint: &str, endpoint_main: &str, queue: &str, mode: NodeMode) -> ClusterConfig {
    ClusterConfig {
        enabled: true,
        endpoint: endpoint.to_string(),
        endpoint_main: endpoint_main.to_string(),
        queue: queue.to_string(),
        mode,
        heartbeat_interval_ms: 100,
        eviction_after_secs: 300,
        raft: RaftConfig::default(),
    }
}
