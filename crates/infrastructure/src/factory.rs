use std::sync::Arc;

use cadence_core::{
    Backend, BackendConfig, BackendDriver, Queue, QueueConfig, QueueDriver, SchedulerResult,
    Store, StoreConfig, StoreDriver,
};
use tracing::info;

use crate::{InMemoryQueue, MemoryBackend, MemoryStore, RedisQueue, SqliteBackend, SqliteStore};

/// 按配置构造存储、记录后端与队列驱动
pub struct DriverFactory;

impl DriverFactory {
    pub async fn create_store(config: &StoreConfig) -> SchedulerResult<Arc<dyn Store>> {
        match config.driver {
            StoreDriver::Memory => {
                info!("Initializing memory job store");
                Ok(Arc::new(MemoryStore::new()))
            }
            StoreDriver::Sqlite => {
                info!("Initializing SQLite job store at {}", config.url);
                Ok(Arc::new(SqliteStore::connect(&config.url).await?))
            }
        }
    }

    pub async fn create_backend(config: &BackendConfig) -> SchedulerResult<Option<Arc<dyn Backend>>> {
        match config.driver {
            BackendDriver::None => Ok(None),
            BackendDriver::Memory => {
                info!("Initializing memory record backend");
                Ok(Some(Arc::new(MemoryBackend::new())))
            }
            BackendDriver::Sqlite => {
                info!("Initializing SQLite record backend at {}", config.url);
                Ok(Some(Arc::new(SqliteBackend::connect(&config.url).await?)))
            }
        }
    }

    pub fn create_queue(name: &str, config: &QueueConfig) -> SchedulerResult<Arc<dyn Queue>> {
        match config.driver {
            QueueDriver::Memory => Ok(Arc::new(InMemoryQueue::with_capacity(name, config.size))),
            QueueDriver::Redis => {
                let key = if config.key.is_empty() {
                    RedisQueue::default_key(name)
                } else {
                    config.key.clone()
                };
                Ok(Arc::new(RedisQueue::new(&config.url, key)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_drivers() {
        let store = DriverFactory::create_store(&StoreConfig::default()).await.unwrap();
        assert_eq!(store.name(), "memory");

        let backend = DriverFactory::create_backend(&BackendConfig::default()).await.unwrap();
        assert_eq!(backend.unwrap().name(), "memory");

        let none = DriverFactory::create_backend(&BackendConfig {
            driver: BackendDriver::None,
            url: String::new(),
        })
        .await
        .unwrap();
        assert!(none.is_none());

        let queue = DriverFactory::create_queue("q", &QueueConfig::default()).unwrap();
        assert_eq!(queue.kind(), "memory");
    }

    #[test]
    fn test_redis_queue_key_defaults_to_name() {
        let config = QueueConfig {
            driver: QueueDriver::Redis,
            url: "redis://127.0.0.1/".into(),
            ..QueueConfig::default()
        };
        let queue = DriverFactory::create_queue("reports", &config).unwrap();
        assert_eq!(queue.kind(), "redis");
    }
}
