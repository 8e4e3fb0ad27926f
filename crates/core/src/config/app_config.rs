use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::models::*;
use crate::duration::parse_duration;
use crate::{SchedulerError, SchedulerResult};

/// 系统配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub store: StoreConfig,
    pub backend: BackendConfig,
    pub broker: BrokerConfig,
    pub cluster: ClusterConfig,
    pub api: ApiConfig,
    pub logging: LogConfig,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// 从配置文件与环境变量加载配置
    ///
    /// 环境变量前缀为 `CADENCE`，层级分隔符为 `__`，例如 `CADENCE__API__ENDPOINT_HTTP`。
    pub fn load(config_path: Option<&str>) -> SchedulerResult<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(SchedulerError::Configuration(format!("配置文件不存在: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for path in ["cadence.toml", "config/cadence.toml"] {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("CADENCE")
                .prefix_separator("__")
                .separator("__"),
        );

        let config: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SchedulerError::Configuration(format!("配置加载失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 字符串解析
    pub fn from_toml(content: &str) -> SchedulerResult<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| SchedulerError::Configuration(format!("TOML 解析失败: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        let invalid = |msg: String| -> SchedulerResult<()> { Err(SchedulerError::Configuration(msg)) };

        if parse_duration(&self.scheduler.default_timeout).is_err() {
            return invalid(format!("无效的默认超时: {}", self.scheduler.default_timeout));
        }
        if self.scheduler.max_wakeup_interval_ms == 0 {
            return invalid("max_wakeup_interval_ms 必须大于0".to_string());
        }

        if self.store.driver == StoreDriver::Sqlite && self.store.url.is_empty() {
            return invalid("sqlite 存储需要 url".to_string());
        }
        if self.backend.driver == BackendDriver::Sqlite && self.backend.url.is_empty() {
            return invalid("sqlite 记录后端需要 url".to_string());
        }

        for (name, queue) in &self.broker.queues {
            if queue.workers == 0 {
                return invalid(format!("队列 {name} 的 workers 必须大于0"));
            }
            if queue.driver == QueueDriver::Redis && queue.url.is_empty() {
                return invalid(format!("redis 队列 {name} 需要 url"));
            }
            if queue.driver == QueueDriver::Memory && queue.size == 0 {
                return invalid(format!("内存队列 {name} 的 size 必须大于0"));
            }
        }

        if self.cluster.enabled {
            if self.cluster.endpoint.is_empty() {
                return invalid("集群 endpoint 不能为空".to_string());
            }
            if self.cluster.heartbeat_interval_ms == 0 {
                return invalid("心跳间隔必须大于0".to_string());
            }
            let raft = &self.cluster.raft;
            if raft.election_timeout_min_ms >= raft.election_timeout_max_ms {
                return invalid("选举超时下限必须小于上限".to_string());
            }
            if raft.heartbeat_interval_ms >= raft.election_timeout_min_ms {
                return invalid("leader 心跳间隔必须小于选举超时下限".to_string());
            }
        }

        if let Some(digest) = &self.api.password_sha2 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return invalid("password_sha2 必须是64位十六进制摘要".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.cluster.endpoint, "127.0.0.1:36380");
        assert_eq!(config.api.endpoint_http, "127.0.0.1:36370");
        assert_eq!(config.api.endpoint_rpc, "127.0.0.1:36360");
        assert_eq!(config.cluster.raft.election_timeout_min_ms, 500);
        assert!(!config.broker.is_enabled());
    }

    #[test]
    fn test_from_toml_with_queues() {
        let config = AppConfig::from_toml(
            r#"
            [store]
            driver = "sqlite"
            url = "sqlite://jobs.db"

            [broker.queues.default]
            workers = 4

            [broker.queues.reports]
            driver = "redis"
            url = "redis://127.0.0.1/"

            [cluster]
            enabled = true
            mode = "HA"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.driver, StoreDriver::Sqlite);
        assert_eq!(config.broker.queues["default"].workers, 4);
        assert_eq!(config.broker.queues["default"].size, 32);
        assert_eq!(config.broker.queues["reports"].driver, QueueDriver::Redis);
        assert!(config.cluster.mode.is_ha());
    }

    #[test]
    fn test_validation_failures() {
        assert!(AppConfig::from_toml("[scheduler]\ndefault_timeout = \"soon\"").is_err());
        assert!(AppConfig::from_toml("[broker.queues.q]\nworkers = 0").is_err());
        assert!(AppConfig::from_toml("[broker.queues.q]\ndriver = \"redis\"").is_err());
        assert!(AppConfig::from_toml("[api]\npassword_sha2 = \"abc\"").is_err());
        assert!(AppConfig::from_toml(
            "[cluster]\nenabled = true\n[cluster.raft]\nelection_timeout_min_ms = 900"
        )
        .is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\nformat = \"json\"").unwrap();
        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/definitely/not/here.toml")).is_err());
    }
}
