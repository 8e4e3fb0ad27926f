use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SchedulerError;

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: usize = 10;
/// 分页大小上限
pub const MAX_PAGE_SIZE: usize = 1000;

/// 运行记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Running,
    Completed,
    Error,
    Timeout,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Running => "running",
            RecordStatus::Completed => "completed",
            RecordStatus::Error => "error",
            RecordStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordStatus::Running)
    }
}

impl FromStr for RecordStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RecordStatus::Running),
            "completed" => Ok(RecordStatus::Completed),
            "error" => Ok(RecordStatus::Error),
            "timeout" => Ok(RecordStatus::Timeout),
            other => Err(SchedulerError::Backend(format!("未知的记录状态: {other}"))),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次触发的运行记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub job_id: String,
    pub job_name: String,
    pub status: RecordStatus,
    pub result: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl Record {
    /// 创建运行中的记录，开始与结束时间均为当前时刻
    pub fn started(id: u64, job_id: impl Into<String>, job_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            job_id: job_id.into(),
            job_name: job_name.into(),
            status: RecordStatus::Running,
            result: String::new(),
            start_at: now,
            end_at: now,
        }
    }
}

/// 分页参数，构造时完成钳制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = if page < 1 { 1 } else { page as usize };
        let page_size = if page_size < 1 {
            DEFAULT_PAGE_SIZE
        } else {
            (page_size as usize).min(MAX_PAGE_SIZE)
        };
        Self { page, page_size }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// 对已排序的切片取当前页
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = self.offset().min(items.len());
        let end = start.saturating_add(self.page_size).min(items.len());
        items[start..end].to_vec()
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE as i64)
    }
}

/// 分页查询结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub page: usize,
    pub page_size: usize,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(Pagination::new(0, 0), Pagination { page: 1, page_size: 10 });
        assert_eq!(Pagination::new(-3, 5000), Pagination { page: 1, page_size: 1000 });
        assert_eq!(Pagination::new(4, 25), Pagination { page: 4, page_size: 25 });
    }

    #[test]
    fn test_pagination_slice() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(Pagination::new(1, 10).slice(&items), (0..10).collect::<Vec<_>>());
        assert_eq!(Pagination::new(3, 10).slice(&items), (20..25).collect::<Vec<_>>());
        assert!(Pagination::new(4, 10).slice(&items).is_empty());
    }

    #[test]
    fn test_record_status_round_trip_through_str() {
        for status in [
            RecordStatus::Running,
            RecordStatus::Completed,
            RecordStatus::Error,
            RecordStatus::Timeout,
        ] {
            assert_eq!(status.as_str().parse::<RecordStatus>().unwrap(), status);
        }
        assert!(!RecordStatus::Running.is_terminal());
        assert!(RecordStatus::Timeout.is_terminal());
    }
}
