use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cadence_api::{create_cluster_router, create_http_router, create_rpc_router, spawn_server, AppState};
use cadence_cluster::{ClusterNode, HttpClusterTransport};
use cadence_core::{AppConfig, FunctionRegistry, RunIdGenerator};
use cadence_dispatcher::{Broker, Listener, Recorder, Scheduler, SchedulerBuilder};
use cadence_infrastructure::DriverFactory;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 服务关闭时等待 HTTP 服务退出的上限
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// 主应用程序：按配置装配存储、调度器、集群节点与对外接口
pub struct Application {
    config: AppConfig,
    scheduler: Scheduler,
    cluster: Option<Arc<ClusterNode>>,
    state: AppState,
    cancel: CancellationToken,
    servers: Mutex<Vec<JoinHandle<()>>>,
}

impl Application {
    /// 创建应用实例，任务函数需事先注册到 `registry`
    pub async fn build(config: AppConfig, registry: Arc<FunctionRegistry>) -> Result<Self> {
        Self::build_with_listener(config, registry, Listener::new()).await
    }

    pub async fn build_with_listener(
        config: AppConfig,
        registry: Arc<FunctionRegistry>,
        listener: Listener,
    ) -> Result<Self> {
        info!("初始化应用程序，版本 {}", cadence_core::VERSION);

        let store = DriverFactory::create_store(&config.store)
            .await
            .context("创建任务存储失败")?;
        let mut builder = SchedulerBuilder::new(store, registry)
            .listener(listener)
            .config(config.scheduler.clone());

        if let Some(backend) = DriverFactory::create_backend(&config.backend)
            .await
            .context("创建记录后端失败")?
        {
            let ids = match config.scheduler.machine_id {
                Some(machine_id) => RunIdGenerator::new(machine_id),
                None => RunIdGenerator::from_host(),
            };
            info!("运行记录机器号: {}", ids.machine_id());
            builder = builder.recorder(Arc::new(Recorder::new(backend, ids)));
        }

        if config.broker.is_enabled() {
            let mut broker = Broker::new();
            let mut names: Vec<_> = config.broker.queues.keys().cloned().collect();
            names.sort();
            for name in names {
                let queue_config = &config.broker.queues[&name];
                let queue = DriverFactory::create_queue(&name, queue_config)
                    .with_context(|| format!("创建队列 {name} 失败"))?;
                broker = broker.with_queue(name, queue, queue_config.workers);
            }
            builder = builder.broker(Arc::new(broker));
        }

        let scheduler = builder.build().await.context("创建调度器失败")?;

        let cluster = if config.cluster.enabled {
            let transport = HttpClusterTransport::new(config.api.password_sha2.clone())
                .context("创建集群传输失败")?;
            let node = ClusterNode::new(
                config.cluster.clone(),
                config.api.endpoint_rpc.clone(),
                config.api.endpoint_http.clone(),
                scheduler.clone(),
                Arc::new(transport),
            )
            .context("创建集群节点失败")?;
            Some(node)
        } else {
            None
        };

        let mut state = AppState::new(scheduler.clone())
            .with_password_sha2(config.api.password_sha2.clone())
            .with_proxy_timeout(Duration::from_millis(config.api.proxy_timeout_ms))
            .context("创建代理客户端失败")?;
        if let Some(node) = &cluster {
            state = state.with_cluster(Arc::clone(node));
        }

        Ok(Self {
            config,
            scheduler,
            cluster,
            state,
            cancel: CancellationToken::new(),
            servers: Mutex::new(Vec::new()),
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn cluster(&self) -> Option<&Arc<ClusterNode>> {
        self.cluster.as_ref()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 启动对外接口、集群节点与调度循环
    ///
    /// HA 模式下调度循环由选举结果启停。
    pub async fn start(&self) -> Result<()> {
        let mut servers = self.servers.lock().await;

        let (_, handle) = spawn_server(
            "HTTP 服务",
            &self.config.api.endpoint_http,
            create_http_router(self.state.clone()),
            self.cancel.child_token(),
        )
        .await?;
        servers.push(handle);

        let (_, handle) = spawn_server(
            "RPC 服务",
            &self.config.api.endpoint_rpc,
            create_rpc_router(self.state.clone()),
            self.cancel.child_token(),
        )
        .await?;
        servers.push(handle);

        if let Some(node) = &self.cluster {
            let (_, handle) = spawn_server(
                "集群 RPC 服务",
                &self.config.cluster.endpoint,
                create_cluster_router(self.state.clone()),
                self.cancel.child_token(),
            )
            .await?;
            servers.push(handle);
            node.start().await.context("加入集群失败")?;
        }
        drop(servers);

        let ha = self.cluster.is_some() && self.config.cluster.mode.is_ha();
        if !ha {
            self.scheduler.start();
        }
        info!("应用程序已启动");
        Ok(())
    }

    /// 启动后等待关闭信号
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.start().await?;
        shutdown.cancelled().await;
        self.shutdown().await;
        Ok(())
    }

    /// 依次停止集群循环、调度器与 broker、HTTP 服务
    pub async fn shutdown(&self) {
        info!("开始关闭应用程序");
        if let Some(node) = &self.cluster {
            node.shutdown();
        }
        self.scheduler.shutdown().await;
        self.cancel.cancel();

        let handles: Vec<_> = self.servers.lock().await.drain(..).collect();
        for handle in handles {
            match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("服务任务异常结束: {}", e),
                Err(_) => warn!("等待服务退出超时"),
            }
        }
        info!("应用程序已关闭");
    }
}
