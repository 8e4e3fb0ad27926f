#[cfg(test)]
mod app_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use cadence::Application;
    use cadence_core::{
        AppConfig, BackendDriver, FunctionRegistry, NodeMode, QueueConfig, StoreDriver, AUTH_HEADER,
    };
    use cadence_testing_utils::{init_test_logging, register_counter, wait_until};
    use serde_json::{json, Value};

    fn free_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    fn base_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.scheduler.max_wakeup_interval_ms = 50;
        config.scheduler.machine_id = Some(3);
        config.api.endpoint_http = free_endpoint();
        config.api.endpoint_rpc = free_endpoint();
        config.cluster.endpoint = free_endpoint();
        config.cluster.heartbeat_interval_ms = 100;
        config
    }

    fn cluster_node_config(main: Option<&AppConfig>, queue: &str, mode: NodeMode) -> AppConfig {
        let mut config = base_config();
        config.cluster.enabled = true;
        config.cluster.queue = queue.to_string();
        config.cluster.mode = mode;
        if let Some(main) = main {
            config.cluster.endpoint_main = main.cluster.endpoint.clone();
        }
        config
    }

    async fn start_app(config: AppConfig, counter_name: &str) -> (Application, Arc<AtomicUsize>) {
        let registry = Arc::new(FunctionRegistry::new());
        let counter = register_counter(&registry, counter_name);
        let app = Application::build(config, registry).await.unwrap();
        app.start().await.unwrap();
        (app, counter)
    }

    async fn post_json(client: &reqwest::Client, url: String, body: Value) -> Value {
        client.post(url).json(&body).send().await.unwrap().json().await.unwrap()
    }

    #[tokio::test]
    async fn test_standalone_interval_job_over_http() {
        init_test_logging();
        let config = base_config();
        let http = config.api.endpoint_http.clone();
        let (app, counter) = start_app(config, "tick").await;
        let client = reqwest::Client::new();

        let body = post_json(
            &client,
            format!("http://{http}/scheduler/job"),
            json!({"name": "fast", "type": "interval", "interval": "100ms", "func_name": "tick"}),
        )
        .await;
        assert_eq!(body["error"], "");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        assert!(wait_until(Duration::from_secs(5), || counter.load(Ordering::SeqCst) >= 2).await);

        let records: Value = client
            .get(format!("http://{http}/recorder/records/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(records["data"]["total"].as_u64().unwrap() >= 1);
        assert_eq!(records["data"]["records"][0]["job_id"], id.as_str());

        app.shutdown().await;
        assert!(!app.scheduler().is_running());
    }

    #[tokio::test]
    async fn test_broker_queue_from_config() {
        init_test_logging();
        let mut config = base_config();
        config.broker.queues.insert("default".to_string(), QueueConfig::default());
        let (app, counter) = start_app(config, "tick").await;

        let job = cadence_core::Job::interval("queued", "100ms")
            .with_func_name("tick")
            .with_queues(vec!["default".to_string()]);
        app.scheduler().add_job(job).await.unwrap();

        assert!(wait_until(Duration::from_secs(5), || counter.load(Ordering::SeqCst) >= 1).await);
        let queues = app.scheduler().get_queues().await;
        assert_eq!(queues.len(), 1);
        assert_eq!(queues[0].name, "default");
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_restart() {
        init_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("cadence.db").display());

        let mut config = base_config();
        config.store.driver = StoreDriver::Sqlite;
        config.store.url = url.clone();
        config.backend.driver = BackendDriver::Sqlite;
        config.backend.url = url.clone();
        let (app, _) = start_app(config.clone(), "tick").await;
        let job = cadence_core::Job::interval("persisted", "1h").with_func_name("tick");
        let job = app.scheduler().add_job(job).await.unwrap();
        app.shutdown().await;
        drop(app);

        let mut config = config;
        config.api.endpoint_http = free_endpoint();
        config.api.endpoint_rpc = free_endpoint();
        let (app, _) = start_app(config, "tick").await;
        let loaded = app.scheduler().get_job(&job.id).await.unwrap();
        assert_eq!(loaded.name, "persisted");
        assert_eq!(
            loaded.next_run_time.timestamp_micros(),
            job.next_run_time.timestamp_micros()
        );
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_cluster_routes_fires_and_proxies_writes() {
        init_test_logging();
        let digest = cadence_api::auth::hash_password("cadence");

        let mut main_config = cluster_node_config(None, "default", NodeMode::Normal);
        main_config.api.password_sha2 = Some(digest.clone());
        let mut worker_config = cluster_node_config(Some(&main_config), "reports", NodeMode::Normal);
        worker_config.api.password_sha2 = Some(digest.clone());
        let main_http = main_config.api.endpoint_http.clone();
        let worker_http = worker_config.api.endpoint_http.clone();

        let (main, main_counter) = start_app(main_config, "tick").await;
        let (worker, worker_counter) = start_app(worker_config, "tick").await;

        assert!(wait_until(Duration::from_secs(5), || main.cluster().unwrap().nodes().len() == 2).await);

        // 写请求发到 worker，由 worker 转发给主节点
        let client = reqwest::Client::new();
        let body: Value = client
            .post(format!("http://{worker_http}/scheduler/job"))
            .header(AUTH_HEADER, &digest)
            .json(&json!({
                "name": "report",
                "type": "interval",
                "interval": "100ms",
                "func_name": "tick",
                "queues": ["reports"],
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["error"], "");
        let id = body["data"]["id"].as_str().unwrap().to_string();
        main.scheduler().get_job(&id).await.unwrap();

        assert!(wait_until(Duration::from_secs(5), || worker_counter.load(Ordering::SeqCst) >= 2).await);
        assert_eq!(main_counter.load(Ordering::SeqCst), 0);

        let unauthorized = client
            .get(format!("http://{main_http}/cluster/nodes"))
            .send()
            .await
            .unwrap();
        assert_eq!(unauthorized.status(), reqwest::StatusCode::UNAUTHORIZED);

        let nodes: Value = client
            .get(format!("http://{main_http}/cluster/nodes"))
            .header(AUTH_HEADER, &digest)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(nodes["data"].as_object().unwrap().len(), 2);

        worker.shutdown().await;
        main.shutdown().await;
    }

    #[tokio::test]
    async fn test_ha_failover_over_http() {
        init_test_logging();
        let first = cluster_node_config(None, "default", NodeMode::Ha);
        let second = cluster_node_config(Some(&first), "default", NodeMode::Ha);
        let third = cluster_node_config(Some(&first), "default", NodeMode::Ha);

        let (a, _) = start_app(first, "tick").await;
        let (b, _) = start_app(second, "tick").await;
        let (c, _) = start_app(third, "tick").await;
        let apps = [a, b, c];

        let leader_of = |apps: &[Application]| -> Vec<usize> {
            apps.iter()
                .enumerate()
                .filter(|(_, app)| app.cluster().is_some_and(|node| node.is_main_node()))
                .map(|(i, _)| i)
                .collect()
        };

        assert!(wait_until(Duration::from_secs(10), || leader_of(&apps).len() == 1).await);
        let old = leader_of(&apps)[0];
        assert!(wait_until(Duration::from_secs(5), || apps[old].scheduler().is_running()).await);

        apps[old].shutdown().await;
        let survivors: Vec<&Application> = apps
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != old)
            .map(|(_, app)| app)
            .collect();
        let new_leader = || {
            survivors
                .iter()
                .filter(|app| app.cluster().is_some_and(|node| node.is_main_node()))
                .count()
                == 1
        };
        assert!(wait_until(Duration::from_secs(10), new_leader).await);

        for app in survivors {
            app.shutdown().await;
        }
    }
}
