use cadence_core::{
    Backend, Job, JobStatus, Pagination, Record, RecordStatus, SchedulerError, Store,
};
use cadence_infrastructure::{SqliteBackend, SqliteStore};
use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;

/// 在临时目录中创建数据库文件
fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}/cadence.db", dir.path().display())
}

fn interval_job(id: &str, offset_secs: i64) -> Job {
    let mut job = Job::interval(format!("job-{id}"), "2s")
        .with_func_name("F")
        .with_arg("n", json!(1));
    job.id = id.to_string();
    job.next_run_time = Utc::now() + Duration::seconds(offset_secs);
    job
}

#[tokio::test]
async fn test_sqlite_store_crud() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::connect(&database_url(&dir)).await.unwrap();

    let job = interval_job("a1", 10);
    store.add_job(&job).await.unwrap();
    assert!(matches!(
        store.add_job(&job).await,
        Err(SchedulerError::DuplicateJob { .. })
    ));

    let loaded = store.get_job("a1").await.unwrap();
    assert_eq!(loaded, job);

    let mut changed = loaded.clone();
    changed.name = "renamed".into();
    changed.next_run_time = Utc::now() + Duration::seconds(30);
    store.update_job(&changed).await.unwrap();
    assert_eq!(store.get_job("a1").await.unwrap().name, "renamed");

    store.delete_job("a1").await.unwrap();
    assert!(matches!(
        store.get_job("a1").await,
        Err(SchedulerError::JobNotFound { .. })
    ));
    assert!(matches!(
        store.update_job(&changed).await,
        Err(SchedulerError::JobNotFound { .. })
    ));
}

#[tokio::test]
async fn test_sqlite_store_next_run_time() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::connect(&database_url(&dir)).await.unwrap();
    assert!(store.get_next_run_time().await.unwrap().is_none());

    let early = interval_job("early", 5);
    let mut paused = interval_job("paused", 1);
    paused.status = JobStatus::Paused;
    store.add_job(&early).await.unwrap();
    store.add_job(&paused).await.unwrap();
    store.add_job(&interval_job("late", 60)).await.unwrap();

    let next = store.get_next_run_time().await.unwrap().unwrap();
    assert_eq!(next.timestamp_micros(), early.next_run_time.timestamp_micros());
    assert_eq!(store.get_all_jobs().await.unwrap().len(), 3);

    store.delete_all_jobs().await.unwrap();
    assert!(store.get_all_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = database_url(&dir);
    {
        let store = SqliteStore::connect(&url).await.unwrap();
        store.add_job(&interval_job("keep", 10)).await.unwrap();
        store.pool().close().await;
    }
    let reopened = SqliteStore::connect(&url).await.unwrap();
    assert_eq!(reopened.get_job("keep").await.unwrap().name, "job-keep");
}

#[tokio::test]
async fn test_sqlite_backend_paging() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteBackend::connect(&database_url(&dir)).await.unwrap();

    let base = Utc::now();
    for i in 0..7u64 {
        let mut record = Record::started(i + 1, if i % 2 == 0 { "even" } else { "odd" }, "job");
        record.start_at = base - Duration::seconds(i as i64);
        backend.record_metadata(&record).await.unwrap();
    }

    let (page, total) = backend.get_all_records(Pagination::new(1, 3)).await.unwrap();
    assert_eq!(total, 7);
    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);

    let (page, _) = backend.get_all_records(Pagination::new(3, 3)).await.unwrap();
    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), vec![7]);

    // 超出范围的页码返回空页
    let (page, total) = backend.get_all_records(Pagination::new(i64::MAX, 1000)).await.unwrap();
    assert!(page.is_empty());
    assert_eq!(total, 7);

    let (even, total) = backend.get_records("even", Pagination::new(1, 10)).await.unwrap();
    assert_eq!(total, 4);
    assert_eq!(even.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3, 5, 7]);

    backend.record_result(3, RecordStatus::Timeout, "deadline").await.unwrap();
    let (even, _) = backend.get_records("even", Pagination::new(1, 2)).await.unwrap();
    assert_eq!(even[1].status, RecordStatus::Timeout);
    assert_eq!(even[1].result, "deadline");

    backend.delete_records("even").await.unwrap();
    let (_, total) = backend.get_all_records(Pagination::default()).await.unwrap();
    assert_eq!(total, 3);

    backend.delete_all_records().await.unwrap();
    let (_, total) = backend.get_all_records(Pagination::default()).await.unwrap();
    assert_eq!(total, 0);
}
