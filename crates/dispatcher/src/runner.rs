use std::sync::Arc;

use cadence_core::{
    format_duration, Event, EventPkg, FunctionRegistry, Job, JobContext, JobFn, RecordStatus,
    SchedulerError, SchedulerResult,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::listener::{panic_message, Listener};
use crate::recorder::Recorder;

/// 单次执行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: Option<u64>,
    pub status: RecordStatus,
    pub result: String,
}

/// 任务执行器
///
/// 负责解析函数、写运行记录、在超时内执行函数并广播执行事件。
pub struct JobRunner {
    registry: Arc<FunctionRegistry>,
    recorder: Option<Arc<Recorder>>,
    listener: Arc<Listener>,
}

impl JobRunner {
    pub fn new(
        registry: Arc<FunctionRegistry>,
        recorder: Option<Arc<Recorder>>,
        listener: Arc<Listener>,
    ) -> Self {
        Self {
            registry,
            recorder,
            listener,
        }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn listener(&self) -> &Arc<Listener> {
        &self.listener
    }

    /// 执行一次任务并等待其结束（完成、出错或超时）
    pub async fn run(&self, job: Job) -> RunOutcome {
        let (func, timeout) = match self.prepare(&job) {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("任务 {} 无法执行: {}", job.id, e);
                self.emit(Event::JOB_ERROR, &job, json!({ "error": e.to_string() }));
                metrics::counter!("cadence_job_runs_total", "status" => RecordStatus::Error.as_str())
                    .increment(1);
                return RunOutcome {
                    run_id: None,
                    status: RecordStatus::Error,
                    result: e.to_string(),
                };
            }
        };

        let run_id = match &self.recorder {
            Some(recorder) => match recorder.record_metadata(&job).await {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("写入运行记录失败 job_id={}: {}", job.id, e);
                    None
                }
            },
            None => None,
        };

        info!(job_id = %job.id, job_name = %job.name, run_id = ?run_id, "开始执行任务");
        self.emit(Event::JOB_EXECUTED, &job, json!({ "run_id": run_id }));

        let cancel = CancellationToken::new();
        let ctx = JobContext::new(cancel.clone(), run_id);
        let mut handle = tokio::spawn(func.call(ctx, job.clone()));

        let (status, result) = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(output))) => {
                debug!("任务 {} 执行完成", job.id);
                (RecordStatus::Completed, String::from_utf8_lossy(&output).into_owned())
            }
            Ok(Ok(Err(e))) => {
                let message = format!("{e:#}");
                warn!("任务 {} 执行失败: {}", job.id, message);
                self.emit(Event::JOB_ERROR, &job, json!({ "run_id": run_id, "error": message }));
                (RecordStatus::Error, message)
            }
            Ok(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic().as_ref())
                } else {
                    join_error.to_string()
                };
                error!("任务 {} 执行 panic: {}", job.id, message);
                self.emit(Event::JOB_ERROR, &job, json!({ "run_id": run_id, "error": message }));
                (RecordStatus::Error, message)
            }
            Err(_) => {
                cancel.cancel();
                handle.abort();
                let timeout_error = SchedulerError::JobTimeout {
                    name: job.name.clone(),
                    timeout: format_duration(timeout),
                    cause: "deadline exceeded".to_string(),
                };
                warn!("{}", timeout_error);
                self.emit(
                    Event::JOB_TIMEOUT,
                    &job,
                    json!({ "run_id": run_id, "error": timeout_error.to_string() }),
                );
                (RecordStatus::Timeout, timeout_error.to_string())
            }
        };

        if let (Some(recorder), Some(id)) = (&self.recorder, run_id) {
            if let Err(e) = recorder.record_result(id, status, &result).await {
                warn!("写入运行结果失败 run_id={}: {}", id, e);
            }
        }
        metrics::counter!("cadence_job_runs_total", "status" => status.as_str()).increment(1);

        RunOutcome {
            run_id,
            status,
            result,
        }
    }

    fn prepare(&self, job: &Job) -> SchedulerResult<(JobFn, std::time::Duration)> {
        let func = match &job.func {
            Some(func) => func.clone(),
            None => self.registry.lookup(&job.func_name)?,
        };
        Ok((func, job.timeout_duration()?))
    }

    fn emit(&self, event: Event, job: &Job, data: serde_json::Value) {
        self.listener.emit(EventPkg::new(event, &job.id, data));
    }
}
