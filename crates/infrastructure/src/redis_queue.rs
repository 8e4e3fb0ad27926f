use async_trait::async_trait;
use cadence_core::{Queue, SchedulerError, SchedulerResult};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 单次 BRPOP 的阻塞秒数
const PULL_BLOCK_SECS: u64 = 1;

fn queue_error(e: redis::RedisError) -> SchedulerError {
    SchedulerError::Queue(e.to_string())
}

/// 基于 Redis 列表的字节队列：LPUSH 入队，BRPOP 出队
pub struct RedisQueue {
    client: redis::Client,
    key: String,
    /// 推送与计数共用的复用连接
    conn: Mutex<Option<ConnectionManager>>,
    /// BRPOP 会占住连接，每个拉取方独占一条
    idle_pull_conns: Mutex<Vec<MultiplexedConnection>>,
    closed: CancellationToken,
}

impl RedisQueue {
    pub fn new(url: &str, key: impl Into<String>) -> SchedulerResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| SchedulerError::Configuration(format!("无效的Redis URL: {e}")))?;
        Ok(Self {
            client,
            key: key.into(),
            conn: Mutex::new(None),
            idle_pull_conns: Mutex::new(Vec::new()),
            closed: CancellationToken::new(),
        })
    }

    /// 队列名对应的默认列表键
    pub fn default_key(queue_name: &str) -> String {
        format!("cadence:queue:{queue_name}")
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn connection(&self) -> SchedulerResult<ConnectionManager> {
        let mut guard = self.conn.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_connection_manager()
            .await
            .map_err(queue_error)?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn pull_connection(&self) -> SchedulerResult<MultiplexedConnection> {
        if let Some(conn) = self.idle_pull_conns.lock().await.pop() {
            return Ok(conn);
        }
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(queue_error)
    }
}

#[async_trait]
impl Queue for RedisQueue {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn init(&self) -> SchedulerResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(queue_error)?;
        info!("Redis queue '{}' connected", self.key);
        Ok(())
    }

    async fn push(&self, payload: Vec<u8>) -> SchedulerResult<()> {
        if self.closed.is_cancelled() {
            return Err(SchedulerError::Queue(format!("Queue '{}' has been cleared", self.key)));
        }
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(queue_error)?;
        debug!("Pushed payload to redis list '{}'", self.key);
        Ok(())
    }

    async fn pull(&self) -> SchedulerResult<Option<Vec<u8>>> {
        loop {
            if self.closed.is_cancelled() {
                return Ok(None);
            }
            let mut conn = self.pull_connection().await?;
            let mut brpop = redis::cmd("BRPOP");
            brpop.arg(&self.key).arg(PULL_BLOCK_SECS);
            let popped = tokio::select! {
                _ = self.closed.cancelled() => return Ok(None),
                result = brpop.query_async::<Option<(String, Vec<u8>)>>(&mut conn) => {
                    result.map_err(queue_error)?
                }
            };
            self.idle_pull_conns.lock().await.push(conn);
            if let Some((_, payload)) = popped {
                return Ok(Some(payload));
            }
        }
    }

    async fn count(&self) -> SchedulerResult<i64> {
        let mut conn = self.connection().await?;
        redis::cmd("LLEN")
            .arg(&self.key)
            .query_async(&mut conn)
            .await
            .map_err(queue_error)
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.closed.cancel();
        let mut conn = self.connection().await?;
        let _: i64 = redis::cmd("DEL")
            .arg(&self.key)
            .query_async(&mut conn)
            .await
            .map_err(queue_error)?;
        self.idle_pull_conns.lock().await.clear();
        info!("Redis queue '{}' cleared", self.key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key() {
        assert_eq!(RedisQueue::default_key("reports"), "cadence:queue:reports");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            RedisQueue::new("not a url", "k"),
            Err(SchedulerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let queue = RedisQueue::new("redis://127.0.0.1:1/", "k").unwrap();
        assert_eq!(queue.kind(), "redis");
        assert_eq!(queue.key(), "k");
    }
}
