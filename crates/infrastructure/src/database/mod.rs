pub mod sqlite;

pub use sqlite::{SqliteBackend, SqliteStore};

use std::str::FromStr;
use std::time::Duration;

use cadence_core::SchedulerResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

/// 创建 SQLite 连接池，文件不存在时自动创建
///
/// 内存数据库只使用单连接，否则每个连接各自看到一份独立的库。
pub async fn connect_sqlite(url: &str) -> SchedulerResult<SqlitePool> {
    debug!("Connecting SQLite database at: {}", url);

    let in_memory = url.contains(":memory:") || url.contains("mode=memory");
    let mut options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await?;
    Ok(pool)
}
