//! 日志初始化

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogConfig, LogFormat};
use crate::{SchedulerError, SchedulerResult};

/// 初始化全局日志，`RUST_LOG` 优先于配置的级别
pub fn init_logging(config: &LogConfig) -> SchedulerResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    result.map_err(|e| SchedulerError::Configuration(format!("初始化日志失败: {e}")))
}
