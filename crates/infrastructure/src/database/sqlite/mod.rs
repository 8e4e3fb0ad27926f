pub mod sqlite_job_store;
pub mod sqlite_record_backend;

pub use sqlite_job_store::SqliteStore;
pub use sqlite_record_backend::SqliteBackend;

use chrono::{DateTime, Utc};

pub(crate) fn to_micros(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}
