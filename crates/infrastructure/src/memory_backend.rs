use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::{Backend, Pagination, Record, RecordStatus, SchedulerError, SchedulerResult};
use chrono::Utc;
use tokio::sync::RwLock;

/// 内存运行记录后端
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    records: Arc<RwLock<HashMap<u64, Record>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn page_of<'a>(records: impl Iterator<Item = &'a Record>, page: Pagination) -> (Vec<Record>, u64) {
        let mut sorted: Vec<&Record> = records.collect();
        sorted.sort_by_key(|r| Reverse((r.start_at, r.id)));
        let total = sorted.len() as u64;
        let records = page.slice(&sorted).into_iter().cloned().collect();
        (records, total)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> SchedulerResult<()> {
        Ok(())
    }

    async fn record_metadata(&self, record: &Record) -> SchedulerResult<()> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn record_result(&self, id: u64, status: RecordStatus, result: &str) -> SchedulerResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| SchedulerError::Backend(format!("运行记录不存在: {id}")))?;
        record.status = status;
        record.result = result.to_string();
        record.end_at = Utc::now();
        Ok(())
    }

    async fn get_records(&self, job_id: &str, page: Pagination) -> SchedulerResult<(Vec<Record>, u64)> {
        let records = self.records.read().await;
        Ok(Self::page_of(
            records.values().filter(|r| r.job_id == job_id),
            page,
        ))
    }

    async fn get_all_records(&self, page: Pagination) -> SchedulerResult<(Vec<Record>, u64)> {
        let records = self.records.read().await;
        Ok(Self::page_of(records.values(), page))
    }

    async fn delete_records(&self, job_id: &str) -> SchedulerResult<()> {
        self.records.write().await.retain(|_, r| r.job_id != job_id);
        Ok(())
    }

    async fn delete_all_records(&self) -> SchedulerResult<()> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.delete_all_records().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: u64, job_id: &str, minutes_ago: i64) -> Record {
        let mut record = Record::started(id, job_id, "job");
        record.start_at = Utc::now() - Duration::minutes(minutes_ago);
        record
    }

    #[tokio::test]
    async fn test_records_sorted_and_paged() {
        let backend = MemoryBackend::new();
        for (id, ago) in [(1, 5), (2, 1), (3, 3), (4, 4), (5, 2)] {
            backend.record_metadata(&record(id, "job-a", ago)).await.unwrap();
        }
        backend.record_metadata(&record(6, "job-b", 0)).await.unwrap();

        let (first, total) = backend.get_records("job-a", Pagination::new(1, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 5]);

        let (last, _) = backend.get_records("job-a", Pagination::new(3, 2)).await.unwrap();
        assert_eq!(last.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);

        let (all, total) = backend.get_all_records(Pagination::new(1, 10)).await.unwrap();
        assert_eq!(total, 6);
        assert_eq!(all[0].id, 6);
    }

    #[tokio::test]
    async fn test_record_result_and_delete() {
        let backend = MemoryBackend::new();
        backend.record_metadata(&record(1, "job-a", 0)).await.unwrap();
        backend
            .record_result(1, RecordStatus::Completed, "ok")
            .await
            .unwrap();
        let (records, _) = backend.get_records("job-a", Pagination::default()).await.unwrap();
        assert_eq!(records[0].status, RecordStatus::Completed);
        assert_eq!(records[0].result, "ok");
        assert!(records[0].end_at >= records[0].start_at);

        assert!(backend.record_result(99, RecordStatus::Error, "").await.is_err());

        backend.delete_records("job-a").await.unwrap();
        let (_, total) = backend.get_all_records(Pagination::default()).await.unwrap();
        assert_eq!(total, 0);
    }
}
