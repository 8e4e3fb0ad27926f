use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_core::{Event, EventPkg, Job, JobCodec, Queue, SchedulerError, SchedulerResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::runner::JobRunner;

const BACKOFF_BASE: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

struct BrokerQueue {
    queue: Arc<dyn Queue>,
    workers: usize,
}

/// 队列概览
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub count: i64,
    pub workers: usize,
}

/// 具名队列集合以及每个队列上的消费 worker
pub struct Broker {
    queues: BTreeMap<String, BrokerQueue>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Self {
            queues: BTreeMap::new(),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn with_queue(mut self, name: impl Into<String>, queue: Arc<dyn Queue>, workers: usize) -> Self {
        self.queues.insert(
            name.into(),
            BrokerQueue {
                queue,
                workers: workers.max(1),
            },
        );
        self
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    /// 初始化队列并为每个队列启动 worker，重复调用无副作用
    pub async fn start(&self, runner: Arc<JobRunner>) -> SchedulerResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        for (name, entry) in &self.queues {
            entry.queue.init().await?;
            for worker_id in 0..entry.workers {
                tokio::spawn(worker_loop(
                    name.clone(),
                    worker_id,
                    Arc::clone(&entry.queue),
                    Arc::clone(&runner),
                    self.cancel.child_token(),
                ));
            }
            info!("队列 {} ({}) 已启动 {} 个 worker", name, entry.queue.kind(), entry.workers);
        }
        Ok(())
    }

    /// 在任务声明的队列与已配置队列的交集中随机挑选一个
    ///
    /// 任务未声明队列时可投递到任意队列。
    pub fn choose_queue(&self, job_queues: &[String]) -> SchedulerResult<String> {
        let candidates: Vec<&String> = if job_queues.is_empty() {
            self.queues.keys().collect()
        } else {
            self.queues.keys().filter(|name| job_queues.contains(name)).collect()
        };
        if candidates.is_empty() {
            return Err(SchedulerError::QueueNotFound(format!("{job_queues:?}")));
        }
        let index = rand::rng().random_range(0..candidates.len());
        Ok(candidates[index].clone())
    }

    pub async fn push_job(&self, queue_name: &str, job: &Job) -> SchedulerResult<()> {
        let entry = self
            .queues
            .get(queue_name)
            .ok_or_else(|| SchedulerError::QueueNotFound(queue_name.to_string()))?;
        let payload = JobCodec::dump(job)?;
        entry.queue.push(payload).await?;
        metrics::counter!("cadence_queue_push_total", "queue" => queue_name.to_string()).increment(1);
        debug!("任务 {} 已推送到队列 {}", job.id, queue_name);
        Ok(())
    }

    pub async fn get_queues(&self) -> Vec<QueueInfo> {
        let mut infos = Vec::with_capacity(self.queues.len());
        for (name, entry) in &self.queues {
            let count = match entry.queue.count().await {
                Ok(count) => count,
                Err(e) => {
                    warn!("读取队列 {} 长度失败: {}", name, e);
                    -1
                }
            };
            infos.push(QueueInfo {
                name: name.clone(),
                kind: entry.queue.kind().to_string(),
                count,
                workers: entry.workers,
            });
        }
        infos
    }

    /// 停止所有 worker 并清理队列
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for (name, entry) in &self.queues {
            if let Err(e) = entry.queue.clear().await {
                warn!("清理队列 {} 失败: {}", name, e);
            }
        }
        info!("broker 已关闭");
    }
}

async fn worker_loop(
    queue_name: String,
    worker_id: usize,
    queue: Arc<dyn Queue>,
    runner: Arc<JobRunner>,
    cancel: CancellationToken,
) {
    debug!("队列 {} worker {} 开始消费", queue_name, worker_id);
    let mut failures: u32 = 0;
    loop {
        let pulled = tokio::select! {
            _ = cancel.cancelled() => break,
            pulled = queue.pull() => pulled,
        };
        match pulled {
            Ok(Some(payload)) => {
                failures = 0;
                match JobCodec::load(&payload, runner.registry()) {
                    Ok(job) => {
                        runner.run(job).await;
                    }
                    Err(e) => warn!("队列 {} 丢弃无法解码的消息: {}", queue_name, e),
                }
            }
            Ok(None) => {
                debug!("队列 {} 已关闭，worker {} 退出", queue_name, worker_id);
                break;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                let delay = backoff_delay(failures);
                error!("队列 {} 拉取失败 (第 {} 次)，{:?} 后重试: {}", queue_name, failures, delay, e);
                runner.listener().emit(EventPkg::new(
                    Event::QUEUE_ERROR,
                    "",
                    json!({ "queue": queue_name, "error": e.to_string() }),
                ));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// 指数退避，带 50% 抖动，上限 30 秒
fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let ceiling = BACKOFF_BASE.saturating_mul(1u32 << exp).min(BACKOFF_MAX);
    let ceiling_ms = ceiling.as_millis() as u64;
    let jittered = rand::rng().random_range(ceiling_ms / 2..=ceiling_ms);
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NullQueue;

    #[async_trait]
    impl Queue for NullQueue {
        fn kind(&self) -> &'static str {
            "null"
        }
        async fn init(&self) -> SchedulerResult<()> {
            Ok(())
        }
        async fn push(&self, _payload: Vec<u8>) -> SchedulerResult<()> {
            Ok(())
        }
        async fn pull(&self) -> SchedulerResult<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn clear(&self) -> SchedulerResult<()> {
            Ok(())
        }
    }

    fn broker() -> Broker {
        Broker::new()
            .with_queue("default", Arc::new(NullQueue), 1)
            .with_queue("reports", Arc::new(NullQueue), 2)
    }

    #[test]
    fn test_choose_queue_intersection() {
        let broker = broker();
        let chosen = broker.choose_queue(&["reports".to_string(), "other".to_string()]).unwrap();
        assert_eq!(chosen, "reports");
    }

    #[test]
    fn test_choose_queue_empty_means_any() {
        let broker = broker();
        let chosen = broker.choose_queue(&[]).unwrap();
        assert!(chosen == "default" || chosen == "reports");
    }

    #[test]
    fn test_choose_queue_not_found() {
        let broker = broker();
        assert!(matches!(
            broker.choose_queue(&["nope".to_string()]),
            Err(SchedulerError::QueueNotFound(_))
        ));
    }

    #[test]
    fn test_backoff_is_bounded() {
        assert!(backoff_delay(1) <= Duration::from_millis(100));
        assert!(backoff_delay(1) >= Duration::from_millis(50));
        assert!(backoff_delay(40) <= BACKOFF_MAX);
        assert!(backoff_delay(40) >= BACKOFF_MAX / 2);
    }

    #[tokio::test]
    async fn test_get_queues() {
        let infos = broker().get_queues().await;
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].name, "default");
        assert_eq!(infos[0].kind, "null");
        assert_eq!(infos[0].count, -1);
        assert_eq!(infos[1].workers, 2);
    }
}
