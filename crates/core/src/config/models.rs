use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::NodeMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 任务未指定超时时使用
    pub default_timeout: String,
    /// 定时循环单次休眠上限
    pub max_wakeup_interval_ms: u64,
    /// 运行 ID 生成器的机器号，缺省由主机名推导
    pub machine_id: Option<u16>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timeout: "1h".to_string(),
            max_wakeup_interval_ms: 1000,
            machine_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub driver: StoreDriver,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendDriver {
    None,
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub driver: BackendDriver,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueDriver {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub driver: QueueDriver,
    pub url: String,
    /// redis 列表键，缺省为 `cadence:queue:<name>`
    pub key: String,
    /// 内存队列容量
    pub size: usize,
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            driver: QueueDriver::Memory,
            url: String::new(),
            key: String::new(),
            size: 32,
            workers: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub queues: HashMap<String, QueueConfig>,
}

impl BrokerConfig {
    pub fn is_enabled(&self) -> bool {
        !self.queues.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaftConfig {
    pub election_timeout_min_ms: u64,
    pub election_timeout_max_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_min_ms: 500,
            election_timeout_max_ms: 800,
            heartbeat_interval_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub enabled: bool,
    /// 集群内部 RPC 地址，同时是节点标识
    pub endpoint: String,
    /// 主节点地址，为空表示本节点即主节点
    pub endpoint_main: String,
    pub queue: String,
    pub mode: NodeMode,
    pub heartbeat_interval_ms: u64,
    pub eviction_after_secs: u64,
    pub raft: RaftConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "127.0.0.1:36380".to_string(),
            endpoint_main: String::new(),
            queue: "default".to_string(),
            mode: NodeMode::Normal,
            heartbeat_interval_ms: 200,
            eviction_after_secs: 300,
            raft: RaftConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint_http: String,
    pub endpoint_rpc: String,
    /// SHA-256 十六进制摘要，为空时不校验
    pub password_sha2: Option<String>,
    pub proxy_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint_http: "127.0.0.1:36370".to_string(),
            endpoint_rpc: "127.0.0.1:36360".to_string(),
            password_sha2: None,
            proxy_timeout_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 抓取地址，为空时不启动
    pub endpoint: Option<String>,
}
