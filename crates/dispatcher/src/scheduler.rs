use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use cadence_core::{
    paused_sentinel, ClusterDispatch, DispatchTarget, Event, EventPkg, FunctionRegistry, Job,
    JobStatus, JobType, RecordPage, SchedulerConfig, SchedulerError, SchedulerResult, Store,
    DEFAULT_TIMEZONE, VERSION,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, QueueInfo};
use crate::listener::Listener;
use crate::next_run::{calc_next_run_time, next_fire_after};
use crate::recorder::Recorder;
use crate::runner::JobRunner;

/// 非主节点的轮询间隔
const FOLLOWER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 调度器状态概览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerInfo {
    pub is_running: bool,
    pub is_cluster_mode: bool,
    pub is_main_node: bool,
    pub main_endpoint: Option<String>,
    pub store: String,
    pub backend: Option<String>,
    pub queues: Vec<String>,
    pub version: String,
}

/// 调度器构建器
pub struct SchedulerBuilder {
    store: Arc<dyn Store>,
    registry: Arc<FunctionRegistry>,
    recorder: Option<Arc<Recorder>>,
    broker: Option<Arc<Broker>>,
    listener: Listener,
    config: SchedulerConfig,
}

impl SchedulerBuilder {
    pub fn new(store: Arc<dyn Store>, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            store,
            registry,
            recorder: None,
            broker: None,
            listener: Listener::new(),
            config: SchedulerConfig::default(),
        }
    }

    pub fn recorder(mut self, recorder: Arc<Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn broker(mut self, broker: Arc<Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn listener(mut self, listener: Listener) -> Self {
        self.listener = listener;
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// 初始化存储与记录后端，启动 broker worker
    pub async fn build(self) -> SchedulerResult<Scheduler> {
        self.store.init().await?;
        if let Some(recorder) = &self.recorder {
            recorder.init().await?;
        }

        let listener = Arc::new(self.listener);
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&self.registry),
            self.recorder.clone(),
            Arc::clone(&listener),
        ));
        if let Some(broker) = &self.broker {
            broker.start(Arc::clone(&runner)).await?;
        }

        info!("调度器已构建，存储驱动: {}", self.store.name());
        Ok(Scheduler {
            inner: Arc::new(SchedulerInner {
                store: self.store,
                registry: self.registry,
                recorder: self.recorder,
                broker: self.broker,
                runner,
                listener,
                cluster: OnceLock::new(),
                config: self.config,
                wakeup: Notify::new(),
                running: Mutex::new(None),
                pass: tokio::sync::Mutex::new(()),
            }),
        })
    }
}

/// 调度器
///
/// 持有任务存储，维护定时循环并在任务到期时分发执行。可廉价克隆。
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    store: Arc<dyn Store>,
    registry: Arc<FunctionRegistry>,
    recorder: Option<Arc<Recorder>>,
    broker: Option<Arc<Broker>>,
    runner: Arc<JobRunner>,
    listener: Arc<Listener>,
    cluster: OnceLock<Arc<dyn ClusterDispatch>>,
    config: SchedulerConfig,
    wakeup: Notify,
    running: Mutex<Option<CancellationToken>>,
    /// 同一时刻只运行一轮到期处理
    pass: tokio::sync::Mutex<()>,
}

impl Scheduler {
    /// 绑定集群，只能绑定一次
    pub fn bind_cluster(&self, cluster: Arc<dyn ClusterDispatch>) -> SchedulerResult<()> {
        self.inner
            .cluster
            .set(cluster)
            .map_err(|_| SchedulerError::Internal("调度器已绑定集群".to_string()))
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.inner.registry
    }

    pub fn recorder(&self) -> Option<&Arc<Recorder>> {
        self.inner.recorder.as_ref()
    }

    pub fn broker(&self) -> Option<&Arc<Broker>> {
        self.inner.broker.as_ref()
    }

    pub fn is_cluster_mode(&self) -> bool {
        self.inner.cluster.get().is_some()
    }

    pub async fn add_job(&self, mut job: Job) -> SchedulerResult<Job> {
        job.id = Job::generate_id();
        job.status = JobStatus::Running;
        job.last_run_time = None;
        self.prepare(&mut job, Utc::now())?;

        self.inner.store.add_job(&job).await?;
        info!("任务已添加: {} ({}) 下次触发 {}", job.name, job.id, job.next_run_time);
        self.emit(Event::JOB_ADDED, &job.id, job_data(&job));
        self.wakeup();
        Ok(job)
    }

    pub async fn get_job(&self, id: &str) -> SchedulerResult<Job> {
        let mut job = self.inner.store.get_job(id).await?;
        self.attach_func(&mut job);
        Ok(job)
    }

    pub async fn get_all_jobs(&self) -> SchedulerResult<Vec<Job>> {
        let mut jobs = self.inner.store.get_all_jobs().await?;
        for job in &mut jobs {
            self.attach_func(job);
        }
        Ok(jobs)
    }

    /// 更新任务定义，保留存储中的状态
    pub async fn update_job(&self, mut job: Job) -> SchedulerResult<Job> {
        let stored = self.inner.store.get_job(&job.id).await?;
        job.status = stored.status;
        if job.last_run_time.is_none() {
            job.last_run_time = stored.last_run_time;
        }
        self.prepare(&mut job, Utc::now())?;

        self.inner.store.update_job(&job).await?;
        info!("任务已更新: {} ({})", job.name, job.id);
        self.emit(Event::JOB_UPDATED, &job.id, job_data(&job));
        self.wakeup();
        Ok(job)
    }

    pub async fn delete_job(&self, id: &str) -> SchedulerResult<()> {
        self.inner.store.delete_job(id).await?;
        info!("任务已删除: {}", id);
        self.emit(Event::JOB_DELETED, id, Value::Null);
        self.wakeup();
        Ok(())
    }

    pub async fn delete_all_jobs(&self) -> SchedulerResult<()> {
        self.inner.store.delete_all_jobs().await?;
        info!("所有任务已删除");
        self.emit(Event::ALL_JOBS_DELETED, "", Value::Null);
        self.wakeup();
        Ok(())
    }

    pub async fn pause_job(&self, id: &str) -> SchedulerResult<Job> {
        let mut job = self.inner.store.get_job(id).await?;
        job.status = JobStatus::Paused;
        job.next_run_time = paused_sentinel();
        self.inner.store.update_job(&job).await?;
        self.attach_func(&mut job);

        info!("任务已暂停: {}", id);
        self.emit(Event::JOB_PAUSED, id, job_data(&job));
        self.wakeup();
        Ok(job)
    }

    pub async fn resume_job(&self, id: &str) -> SchedulerResult<Job> {
        let mut job = self.inner.store.get_job(id).await?;
        job.status = JobStatus::Running;
        job.next_run_time = calc_next_run_time(&job, Utc::now())?;
        self.inner.store.update_job(&job).await?;
        self.attach_func(&mut job);

        info!("任务已恢复: {} 下次触发 {}", id, job.next_run_time);
        self.emit(Event::JOB_RESUMED, id, job_data(&job));
        self.wakeup();
        Ok(job)
    }

    /// 立即执行一次，不影响调度计划
    pub async fn run_job(&self, mut job: Job) -> SchedulerResult<()> {
        self.inner.registry.bind(&mut job)?;
        job.check()?;
        info!("手动执行任务: {} ({})", job.name, job.id);
        self.spawn_run(job);
        Ok(())
    }

    /// 重新计算下次触发时间并持久化，不触发执行
    pub async fn schedule_job(&self, job: Job) -> SchedulerResult<Job> {
        let mut stored = self.inner.store.get_job(&job.id).await?;
        stored.next_run_time = calc_next_run_time(&stored, Utc::now())?;
        self.inner.store.update_job(&stored).await?;
        debug!("任务 {} 重新计划，下次触发 {}", stored.id, stored.next_run_time);
        self.wakeup();
        Ok(stored)
    }

    /// 把一次触发交给集群、broker 或本地执行
    pub async fn dispatch_job(&self, job: Job) -> SchedulerResult<()> {
        if let Some(cluster) = self.inner.cluster.get() {
            match cluster.dispatch(&job).await? {
                DispatchTarget::Local => {}
                DispatchTarget::Remote { endpoint } => {
                    debug!("任务 {} 已交给节点 {}", job.id, endpoint);
                    return Ok(());
                }
            }
        }
        self.dispatch_local(job).await
    }

    /// 在本节点执行一次触发：配置了 broker 时入队，否则直接执行
    pub async fn dispatch_local(&self, mut job: Job) -> SchedulerResult<()> {
        if let Some(broker) = &self.inner.broker {
            let queue = broker.choose_queue(&job.queues)?;
            return broker.push_job(&queue, &job).await;
        }
        if job.func.is_none() {
            self.inner.registry.bind(&mut job)?;
        }
        self.spawn_run(job);
        Ok(())
    }

    pub async fn get_records(&self, job_id: &str, page: i64, page_size: i64) -> SchedulerResult<RecordPage> {
        self.require_recorder()?.get_records(job_id, page, page_size).await
    }

    pub async fn get_all_records(&self, page: i64, page_size: i64) -> SchedulerResult<RecordPage> {
        self.require_recorder()?.get_all_records(page, page_size).await
    }

    pub async fn delete_records(&self, job_id: &str) -> SchedulerResult<()> {
        self.require_recorder()?.delete_records(job_id).await
    }

    pub async fn delete_all_records(&self) -> SchedulerResult<()> {
        self.require_recorder()?.delete_all_records().await
    }

    pub async fn get_queues(&self) -> Vec<QueueInfo> {
        match &self.inner.broker {
            Some(broker) => broker.get_queues().await,
            None => Vec::new(),
        }
    }

    /// 启动定时循环，已运行时直接返回
    pub fn start(&self) {
        let token = {
            let mut running = lock_running(&self.inner.running);
            if running.is_some() {
                debug!("调度器已在运行");
                return;
            }
            let token = CancellationToken::new();
            *running = Some(token.clone());
            token
        };

        tokio::spawn(run_loop(Arc::clone(&self.inner), token));
        info!("调度器已启动");
        self.emit(Event::SCHEDULER_STARTED, "", Value::Null);
    }

    /// 停止定时循环，正在执行的任务不受影响
    pub fn stop(&self) {
        let token = lock_running(&self.inner.running).take();
        match token {
            Some(token) => {
                token.cancel();
                info!("调度器已停止");
                self.emit(Event::SCHEDULER_STOPPED, "", Value::Null);
            }
            None => debug!("调度器未运行"),
        }
    }

    pub fn is_running(&self) -> bool {
        lock_running(&self.inner.running).is_some()
    }

    /// 停止调度并关闭 broker
    pub async fn shutdown(&self) {
        self.stop();
        if let Some(broker) = &self.inner.broker {
            broker.shutdown().await;
        }
    }

    pub fn info(&self) -> SchedulerInfo {
        let cluster = self.inner.cluster.get();
        SchedulerInfo {
            is_running: self.is_running(),
            is_cluster_mode: cluster.is_some(),
            is_main_node: cluster.map(|c| c.is_main_node()).unwrap_or(true),
            main_endpoint: cluster.and_then(|c| c.main_endpoint()),
            store: self.inner.store.name().to_string(),
            backend: self.inner.recorder.as_ref().map(|r| r.backend_name().to_string()),
            queues: self
                .inner
                .broker
                .as_ref()
                .map(|b| b.queue_names())
                .unwrap_or_default(),
            version: VERSION.to_string(),
        }
    }

    /// 唤醒定时循环重新计算休眠时间
    pub fn wakeup(&self) {
        self.inner.wakeup.notify_one();
    }

    fn prepare(&self, job: &mut Job, now: DateTime<Utc>) -> SchedulerResult<()> {
        if job.timezone.trim().is_empty() {
            job.timezone = DEFAULT_TIMEZONE.to_string();
        }
        if job.timeout.trim().is_empty() {
            job.timeout = self.inner.config.default_timeout.clone();
        }
        self.inner.registry.bind(job)?;
        job.check()?;
        job.next_run_time = calc_next_run_time(job, now)?;
        Ok(())
    }

    fn attach_func(&self, job: &mut Job) {
        if job.func.is_none() {
            job.func = self.inner.registry.lookup(&job.func_name).ok();
        }
    }

    fn spawn_run(&self, job: Job) {
        let runner = Arc::clone(&self.inner.runner);
        tokio::spawn(async move {
            runner.run(job).await;
        });
    }

    fn require_recorder(&self) -> SchedulerResult<&Arc<Recorder>> {
        self.inner
            .recorder
            .as_ref()
            .ok_or_else(|| SchedulerError::Backend("未配置记录后端".to_string()))
    }

    fn emit(&self, event: Event, job_id: &str, data: Value) {
        self.inner.listener.emit(EventPkg::new(event, job_id, data));
    }
}

fn job_data(job: &Job) -> Value {
    serde_json::to_value(job).unwrap_or(Value::Null)
}

fn lock_running(
    running: &Mutex<Option<CancellationToken>>,
) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
    running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_loop(inner: Arc<SchedulerInner>, token: CancellationToken) {
    let scheduler = Scheduler {
        inner: Arc::clone(&inner),
    };
    let mut pass_failed = false;

    loop {
        let wait = if pass_failed {
            inner.max_wakeup()
        } else {
            inner.next_wakeup_interval().await
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = inner.wakeup.notified() => {
                debug!("定时循环被唤醒");
            }
            _ = tokio::time::sleep(wait) => {}
        }
        if token.is_cancelled() {
            break;
        }

        if let Some(cluster) = inner.cluster.get() {
            if !cluster.is_main_node() {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(FOLLOWER_POLL_INTERVAL) => {}
                }
                continue;
            }
        }

        let _pass = inner.pass.lock().await;
        if token.is_cancelled() {
            break;
        }
        pass_failed = match scheduler.process_due_jobs().await {
            Ok(()) => false,
            Err(e) => {
                error!("处理到期任务失败: {}", e);
                true
            }
        };
    }
    debug!("定时循环退出");
}

impl SchedulerInner {
    fn max_wakeup(&self) -> Duration {
        Duration::from_millis(self.config.max_wakeup_interval_ms.max(1))
    }

    async fn next_wakeup_interval(&self) -> Duration {
        let cap = self.max_wakeup();
        match self.store.get_next_run_time().await {
            Ok(Some(next)) => {
                let now = Utc::now();
                if next <= now {
                    Duration::ZERO
                } else {
                    (next - now).to_std().map(|d| d.min(cap)).unwrap_or(cap)
                }
            }
            Ok(None) => cap,
            Err(e) => {
                warn!("读取下次触发时间失败: {}", e);
                cap
            }
        }
    }
}

impl Scheduler {
    async fn process_due_jobs(&self) -> SchedulerResult<()> {
        let now = Utc::now();
        let mut due: Vec<Job> = self
            .inner
            .store
            .get_all_jobs()
            .await?
            .into_iter()
            .filter(|job| job.status == JobStatus::Running && job.next_run_time <= now)
            .collect();
        due.sort_by(|a, b| {
            a.next_run_time
                .cmp(&b.next_run_time)
                .then_with(|| a.id.cmp(&b.id))
        });

        for job in due {
            let fired = match self.advance(job, now).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    error!("推进任务失败: {}", e);
                    continue;
                }
            };

            info!(job_id = %fired.id, job_name = %fired.name, "任务触发");
            metrics::counter!("cadence_job_fires_total").increment(1);
            let scheduler = self.clone();
            tokio::spawn(async move {
                let id = fired.id.clone();
                if let Err(e) = scheduler.dispatch_job(fired).await {
                    error!("分发任务 {} 失败: {}", id, e);
                }
            });
        }
        Ok(())
    }

    /// 持久化触发后的状态：一次性任务删除，周期任务推进到下一次
    async fn advance(&self, job: Job, now: DateTime<Utc>) -> SchedulerResult<Option<Job>> {
        if job.job_type == JobType::Datetime {
            match self.inner.store.delete_job(&job.id).await {
                Ok(()) | Err(SchedulerError::JobNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            self.emit(Event::JOB_DELETED, &job.id, Value::Null);
            return Ok(Some(job));
        }

        let mut next = job;
        match next_fire_after(&next, now) {
            Ok(next_run_time) => {
                next.last_run_time = Some(now);
                next.next_run_time = next_run_time;
                self.inner.store.update_job(&next).await?;
                Ok(Some(next))
            }
            Err(e) => {
                // 无法计算下次触发的任务转为暂停，避免循环空转
                warn!("任务 {} 无法计算下次触发时间，已暂停: {}", next.id, e);
                next.status = JobStatus::Paused;
                next.next_run_time = paused_sentinel();
                self.inner.store.update_job(&next).await?;
                self.emit(Event::JOB_PAUSED, &next.id, Value::Null);
                Ok(None)
            }
        }
    }
}
