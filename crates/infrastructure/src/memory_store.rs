use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use cadence_core::{Job, JobStatus, SchedulerError, SchedulerResult, Store};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

/// 内存任务存储，进程退出即丢失，不适合多副本共享
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> SchedulerResult<()> {
        debug!("Memory store ready");
        Ok(())
    }

    async fn add_job(&self, job: &Job) -> SchedulerResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(SchedulerError::DuplicateJob { id: job.id.clone() });
        }
        let mut stored = job.clone();
        stored.func = None;
        jobs.insert(job.id.clone(), stored);
        Ok(())
    }

    async fn get_job(&self, id: &str) -> SchedulerResult<Job> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SchedulerError::job_not_found(id))
    }

    async fn get_all_jobs(&self) -> SchedulerResult<Vec<Job>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }

    async fn update_job(&self, job: &Job) -> SchedulerResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job.clone();
                existing.func = None;
                Ok(())
            }
            None => Err(SchedulerError::job_not_found(&job.id)),
        }
    }

    async fn delete_job(&self, id: &str) -> SchedulerResult<()> {
        self.jobs
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::job_not_found(id))
    }

    async fn delete_all_jobs(&self) -> SchedulerResult<()> {
        self.jobs.write().await.clear();
        Ok(())
    }

    async fn get_next_run_time(&self) -> SchedulerResult<Option<DateTime<Utc>>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == JobStatus::Running)
            .map(|job| job.next_run_time)
            .min())
    }

    async fn clear(&self) -> SchedulerResult<()> {
        self.delete_all_jobs().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(id: &str, offset_secs: i64) -> Job {
        let mut job = Job::interval(id, "1s").with_func_name("F");
        job.id = id.to_string();
        job.next_run_time = Utc::now() + Duration::seconds(offset_secs);
        job
    }

    #[tokio::test]
    async fn test_crud_and_duplicates() {
        let store = MemoryStore::new();
        store.add_job(&job("a", 10)).await.unwrap();
        assert!(matches!(
            store.add_job(&job("a", 10)).await,
            Err(SchedulerError::DuplicateJob { .. })
        ));

        let mut updated = store.get_job("a").await.unwrap();
        updated.name = "renamed".into();
        store.update_job(&updated).await.unwrap();
        assert_eq!(store.get_job("a").await.unwrap().name, "renamed");

        store.delete_job("a").await.unwrap();
        assert!(matches!(
            store.get_job("a").await,
            Err(SchedulerError::JobNotFound { .. })
        ));
        assert!(store.update_job(&updated).await.is_err());
    }

    #[tokio::test]
    async fn test_next_run_time_skips_paused() {
        let store = MemoryStore::new();
        assert!(store.get_next_run_time().await.unwrap().is_none());

        let early = job("early", 5);
        let mut paused = job("paused", 1);
        paused.status = JobStatus::Paused;
        store.add_job(&early).await.unwrap();
        store.add_job(&paused).await.unwrap();
        store.add_job(&job("late", 50)).await.unwrap();

        assert_eq!(
            store.get_next_run_time().await.unwrap(),
            Some(early.next_run_time)
        );

        store.delete_all_jobs().await.unwrap();
        assert!(store.get_all_jobs().await.unwrap().is_empty());
    }
}
