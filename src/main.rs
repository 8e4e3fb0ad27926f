use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cadence::{builtin, wait_for_shutdown_signal, Application, ShutdownManager};
use cadence_core::{init_logging, AppConfig, FunctionRegistry, LogFormat};
use clap::Parser;
use tracing::{error, info, warn};

/// 分布式任务调度器
#[derive(Debug, Parser)]
#[command(name = "cadence", version, about = "分布式任务调度器")]
struct Cli {
    /// 配置文件路径，缺省依次查找 cadence.toml 与 config/cadence.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error"])]
    log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, value_name = "FORMAT", value_parser = ["json", "pretty"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())
        .with_context(|| format!("加载配置失败: {:?}", cli.config))?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format.as_deref() {
        config.logging.format = match format {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
    }
    init_logging(&config.logging)?;

    info!("启动 cadence {}", cadence_core::VERSION);
    if let Some(path) = &cli.config {
        info!("配置文件: {path}");
    }

    if let Some(endpoint) = &config.metrics.endpoint {
        init_metrics(endpoint)?;
    }

    let registry = Arc::new(FunctionRegistry::new());
    builtin::register_builtins(&registry);
    info!("已注册任务函数: {:?}", registry.names());

    let app = Arc::new(Application::build(config, registry).await?);
    let shutdown_manager = ShutdownManager::new();

    let app_handle = {
        let app = Arc::clone(&app);
        let shutdown = shutdown_manager.subscribe();
        let failed = shutdown_manager.clone();
        tokio::spawn(async move {
            if let Err(e) = app.run(shutdown).await {
                error!("应用运行失败: {e:#}");
                failed.shutdown();
            }
        })
    };

    let shutdown = shutdown_manager.subscribe();
    tokio::select! {
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown();
        }
        _ = shutdown.cancelled() => {}
    }

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("cadence 已退出");
    Ok(())
}

/// 在指定地址上暴露 Prometheus 指标
fn init_metrics(endpoint: &str) -> Result<()> {
    let addr: SocketAddr = endpoint
        .parse()
        .with_context(|| format!("无效的指标地址: {endpoint}"))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("安装 Prometheus 导出器失败: {e}"))?;
    info!("Prometheus 指标导出于 http://{addr}/metrics");
    Ok(())
}
