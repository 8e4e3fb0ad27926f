use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::{Queue, SchedulerError, SchedulerResult};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 默认容量
pub const DEFAULT_QUEUE_SIZE: usize = 32;

/// 内存字节队列
///
/// 基于有界 Tokio channel，接收端以 `Arc<Mutex<_>>` 在多个 worker 间共享。
#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    sender: mpsc::Sender<Vec<u8>>,
    /// 使用 Arc 包装接收端，支持多个消费者
    receiver: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
    closed: CancellationToken,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_QUEUE_SIZE)
    }

    pub fn with_capacity(name: impl Into<String>, size: usize) -> Self {
        let name = name.into();
        let (sender, receiver) = mpsc::channel(size.max(1));
        info!("Creating in-memory queue '{}' with capacity {}", name, size.max(1));
        Self {
            name,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            closed: CancellationToken::new(),
        }
    }

    fn closed_error(&self) -> SchedulerError {
        SchedulerError::Queue(format!("Queue '{}' has been cleared", self.name))
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> SchedulerResult<()> {
        if self.closed.is_cancelled() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    async fn push(&self, payload: Vec<u8>) -> SchedulerResult<()> {
        if self.closed.is_cancelled() {
            return Err(self.closed_error());
        }
        tokio::select! {
            _ = self.closed.cancelled() => Err(self.closed_error()),
            sent = self.sender.send(payload) => {
                sent.map_err(|e| SchedulerError::Queue(format!(
                    "Failed to send to queue '{}': {}", self.name, e
                )))?;
                debug!("Pushed payload to queue '{}'", self.name);
                Ok(())
            }
        }
    }

    async fn pull(&self) -> SchedulerResult<Option<Vec<u8>>> {
        tokio::select! {
            _ = self.closed.cancelled() => Ok(None),
            payload = async {
                let mut rx = self.receiver.lock().await;
                rx.recv().await
            } => Ok(payload),
        }
    }

    async fn count(&self) -> SchedulerResult<i64> {
        Ok((self.sender.max_capacity() - self.sender.capacity()) as i64)
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.closed.cancel();
        if let Ok(mut rx) = self.receiver.try_lock() {
            while rx.try_recv().is_ok() {}
        }
        info!("In-memory queue '{}' cleared", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_push_pull_fifo() {
        let queue = InMemoryQueue::new("q");
        queue.init().await.unwrap();
        queue.push(b"one".to_vec()).await.unwrap();
        queue.push(b"two".to_vec()).await.unwrap();
        assert_eq!(queue.count().await.unwrap(), 2);

        assert_eq!(queue.pull().await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(queue.pull().await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(queue.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_releases_waiting_consumers() {
        let queue = Arc::new(InMemoryQueue::new("q"));
        let waiting = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pull().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.clear().await.unwrap();

        let pulled = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(pulled.is_none());
        assert!(queue.push(b"late".to_vec()).await.is_err());
    }

    #[tokio::test]
    async fn test_consumers_share_receiver() {
        let queue = Arc::new(InMemoryQueue::with_capacity("q", 8));
        for i in 0..4u8 {
            queue.push(vec![i]).await.unwrap();
        }
        let mut handles = Vec::new();
        for _ in 0..2 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::new();
                for _ in 0..2 {
                    got.extend(queue.pull().await.unwrap().unwrap());
                }
                got
            }));
        }
        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }
}
