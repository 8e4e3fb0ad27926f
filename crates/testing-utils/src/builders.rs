//! 测试用调度器与任务函数

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cadence_core::{FunctionRegistry, Job, JobContext, JobOutput, RunIdGenerator, SchedulerConfig};
use cadence_dispatcher::{Broker, Listener, Recorder, Scheduler, SchedulerBuilder};
use cadence_infrastructure::{MemoryBackend, MemoryStore};

pub async fn say_hello(_ctx: JobContext, job: Job) -> JobOutput {
    Ok(format!("hello {}", job.name).into_bytes())
}

pub async fn always_fail(_ctx: JobContext, _job: Job) -> JobOutput {
    Err(anyhow::anyhow!("intentional failure"))
}

/// 在取消前一直睡眠
pub async fn sleep_forever(ctx: JobContext, _job: Job) -> JobOutput {
    ctx.cancel.cancelled().await;
    Err(anyhow::anyhow!("cancelled"))
}

/// 注册了 `say_hello`、`always_fail`、`sleep_forever` 的注册表
pub fn test_registry() -> Arc<FunctionRegistry> {
    let registry = Arc::new(FunctionRegistry::new());
    registry.register("say_hello", say_hello);
    registry.register("always_fail", always_fail);
    registry.register("sleep_forever", sleep_forever);
    registry
}

/// 注册一个调用计数函数，返回计数器
pub fn register_counter(registry: &FunctionRegistry, name: &str) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&counter);
    registry.register(name, move |_ctx: JobContext, _job: Job| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(Vec::new())
        }
    });
    counter
}

/// 唤醒间隔较短的调度配置
pub fn fast_config() -> SchedulerConfig {
    SchedulerConfig {
        max_wakeup_interval_ms: 50,
        ..SchedulerConfig::default()
    }
}

/// 内存存储与内存记录后端上的调度器构建器
pub struct TestSchedulerBuilder {
    registry: Arc<FunctionRegistry>,
    listener: Listener,
    broker: Option<Arc<Broker>>,
    machine_id: u16,
}

impl TestSchedulerBuilder {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            listener: Listener::new(),
            broker: None,
            machine_id: 1,
        }
    }

    pub fn with_listener(mut self, listener: Listener) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_broker(mut self, broker: Arc<Broker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_machine_id(mut self, machine_id: u16) -> Self {
        self.machine_id = machine_id;
        self
    }

    pub async fn build(self) -> Scheduler {
        let recorder = Arc::new(Recorder::new(
            Arc::new(MemoryBackend::new()),
            RunIdGenerator::new(self.machine_id),
        ));
        let mut builder = SchedulerBuilder::new(Arc::new(MemoryStore::new()), self.registry)
            .recorder(recorder)
            .listener(self.listener)
            .config(fast_config());
        if let Some(broker) = self.broker {
            builder = builder.broker(broker);
        }
        match builder.build().await {
            Ok(scheduler) => scheduler,
            Err(e) => panic!("构建测试调度器失败: {e}"),
        }
    }
}

/// 轮询等待条件成立
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
