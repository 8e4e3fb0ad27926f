//! 配置管理
//!
//! 加载顺序：内置默认值 → TOML 配置文件 → `CADENCE__` 前缀的环境变量。

pub mod app_config;
pub mod models;

pub use app_config::*;
pub use models::*;
