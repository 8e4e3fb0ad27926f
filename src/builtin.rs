//! 可执行文件内置的任务函数

use cadence_core::{FunctionRegistry, Job, JobContext, JobOutput};
use tracing::info;

/// 打印任务参数
pub async fn print_msg(ctx: JobContext, job: Job) -> JobOutput {
    let args = serde_json::to_string(&job.args)?;
    info!(run_id = ?ctx.run_id, "任务 {} ({}) 执行，参数: {}", job.name, job.id, args);
    Ok(args.into_bytes())
}

/// 等待 `args.seconds` 秒，可被超时取消
pub async fn sleep(ctx: JobContext, job: Job) -> JobOutput {
    let seconds = job.args.get("seconds").and_then(|v| v.as_f64()).unwrap_or(1.0);
    tokio::select! {
        _ = ctx.cancel.cancelled() => Err(anyhow::anyhow!("任务 {} 已取消", job.id)),
        _ = tokio::time::sleep(std::time::Duration::from_secs_f64(seconds.max(0.0))) => {
            Ok(format!("slept {seconds}s").into_bytes())
        }
    }
}

pub fn register_builtins(registry: &FunctionRegistry) {
    registry.register("print_msg", print_msg);
    registry.register("sleep", sleep);
}
