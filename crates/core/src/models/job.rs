use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::duration::{format_duration, parse_duration};
use crate::registry::JobFn;
use crate::{SchedulerError, SchedulerResult};

/// 默认单次运行超时
pub const DEFAULT_TIMEOUT: &str = "1h";
/// 默认时区
pub const DEFAULT_TIMEZONE: &str = "UTC";
/// `start_at` 的墙钟格式
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 暂停任务的 `next_run_time` 哨兵值：9999-09-09 09:09:09 UTC
pub fn paused_sentinel() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 9, 9)
        .and_then(|d| d.and_hms_opt(9, 9, 9))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Datetime,
    Interval,
    Cron,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Datetime => "datetime",
            JobType::Interval => "interval",
            JobType::Cron => "cron",
        }
    }
}

impl FromStr for JobType {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "datetime" => Ok(JobType::Datetime),
            "interval" => Ok(JobType::Interval),
            "cron" => Ok(JobType::Cron),
            other => Err(SchedulerError::InvalidJob(format!("未知的任务类型: {other}"))),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Running,
    Paused,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
        }
    }
}

/// 时长字段同时接受字符串与纳秒整数，统一为字符串形式
fn duration_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Nanos(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => Ok(text),
        Raw::Nanos(nanos) => Ok(format_duration(Duration::from_nanos(nanos))),
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

/// 调度任务
///
/// `func` 不参与序列化，反序列化后需通过 [`crate::FunctionRegistry::bind`] 按 `func_name` 重新绑定。
#[derive(Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    /// `datetime` 任务的触发时刻，RFC-3339 或时区内的 `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub start_at: String,
    #[serde(default, deserialize_with = "duration_field")]
    pub interval: String,
    #[serde(default)]
    pub cron_expr: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub func_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default = "default_timeout", deserialize_with = "duration_field")]
    pub timeout: String,
    #[serde(default)]
    pub queues: Vec<String>,
    #[serde(default)]
    pub last_run_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_time: DateTime<Utc>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(skip)]
    pub func: Option<JobFn>,
}

impl Job {
    fn with_type(name: impl Into<String>, job_type: JobType) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            job_type,
            start_at: String::new(),
            interval: String::new(),
            cron_expr: String::new(),
            timezone: default_timezone(),
            func_name: String::new(),
            args: Map::new(),
            timeout: default_timeout(),
            queues: Vec::new(),
            last_run_time: None,
            next_run_time: DateTime::<Utc>::default(),
            status: JobStatus::Running,
            func: None,
        }
    }

    /// 创建一次性任务
    pub fn datetime(name: impl Into<String>, start_at: impl Into<String>) -> Self {
        let mut job = Self::with_type(name, JobType::Datetime);
        job.start_at = start_at.into();
        job
    }

    /// 创建固定间隔任务
    pub fn interval(name: impl Into<String>, interval: impl Into<String>) -> Self {
        let mut job = Self::with_type(name, JobType::Interval);
        job.interval = interval.into();
        job
    }

    /// 创建 cron 任务
    pub fn cron(name: impl Into<String>, cron_expr: impl Into<String>) -> Self {
        let mut job = Self::with_type(name, JobType::Cron);
        job.cron_expr = cron_expr.into();
        job
    }

    pub fn with_func_name(mut self, func_name: impl Into<String>) -> Self {
        self.func_name = func_name.into();
        self
    }

    pub fn with_func(mut self, func: JobFn) -> Self {
        self.func = Some(func);
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn with_queues(mut self, queues: Vec<String>) -> Self {
        self.queues = queues;
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    /// 生成 32 位十六进制任务 ID
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn is_paused(&self) -> bool {
        self.status == JobStatus::Paused
    }

    /// 解析时区
    pub fn location(&self) -> SchedulerResult<Tz> {
        let name = if self.timezone.is_empty() {
            DEFAULT_TIMEZONE
        } else {
            self.timezone.as_str()
        };
        name.parse::<Tz>()
            .map_err(|_| SchedulerError::InvalidJob(format!("未知的时区: {name}")))
    }

    pub fn timeout_duration(&self) -> SchedulerResult<Duration> {
        if self.timeout.is_empty() {
            return parse_duration(DEFAULT_TIMEOUT);
        }
        parse_duration(&self.timeout)
    }

    pub fn interval_duration(&self) -> SchedulerResult<Duration> {
        let interval = parse_duration(&self.interval)?;
        if interval.is_zero() {
            return Err(SchedulerError::InvalidJob("间隔必须大于0".to_string()));
        }
        Ok(interval)
    }

    /// 解析 `start_at`，墙钟格式按任务时区解释
    pub fn start_at_instant(&self) -> SchedulerResult<DateTime<Utc>> {
        let raw = self.start_at.trim();
        if raw.is_empty() {
            return Err(SchedulerError::InvalidJob("datetime 任务缺少 start_at".to_string()));
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Ok(instant.with_timezone(&Utc));
        }

        let naive = NaiveDateTime::parse_from_str(raw, WALL_CLOCK_FORMAT)
            .map_err(|e| SchedulerError::InvalidJob(format!("无效的 start_at {raw:?}: {e}")))?;
        let tz = self.location()?;
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| SchedulerError::InvalidJob(format!("start_at 在时区 {} 中不存在: {raw}", tz.name())))
    }

    /// 按类型检查必填字段、时区与超时
    pub fn check(&self) -> SchedulerResult<()> {
        self.location()?;
        self.timeout_duration()?;
        match self.job_type {
            JobType::Datetime => {
                self.start_at_instant()?;
            }
            JobType::Interval => {
                self.interval_duration()?;
            }
            JobType::Cron => {
                if self.cron_expr.trim().is_empty() {
                    return Err(SchedulerError::InvalidJob("cron 任务缺少 cron_expr".to_string()));
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.job_type == other.job_type
            && self.start_at == other.start_at
            && self.interval == other.interval
            && self.cron_expr == other.cron_expr
            && self.timezone == other.timezone
            && self.func_name == other.func_name
            && self.args == other.args
            && self.timeout == other.timeout
            && self.queues == other.queues
            && self.last_run_time == other.last_run_time
            && self.next_run_time == other.next_run_time
            && self.status == other.status
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.job_type)
            .field("start_at", &self.start_at)
            .field("interval", &self.interval)
            .field("cron_expr", &self.cron_expr)
            .field("timezone", &self.timezone)
            .field("func_name", &self.func_name)
            .field("timeout", &self.timeout)
            .field("queues", &self.queues)
            .field("next_run_time", &self.next_run_time)
            .field("status", &self.status)
            .field("bound", &self.func.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_defaults() {
        let job: Job = serde_json::from_value(json!({
            "type": "interval",
            "interval": "2s",
            "func_name": "F"
        }))
        .unwrap();
        assert_eq!(job.timezone, "UTC");
        assert_eq!(job.timeout, "1h");
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.queues.is_empty());
        assert!(job.last_run_time.is_none());
    }

    #[test]
    fn test_interval_accepts_nanoseconds() {
        let job: Job = serde_json::from_value(json!({
            "type": "interval",
            "interval": 500_000_000u64,
            "timeout": 2_000_000_000u64
        }))
        .unwrap();
        assert_eq!(job.interval, "500ms");
        assert_eq!(job.timeout, "2s");
        assert_eq!(job.interval_duration().unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result: Result<Job, _> = serde_json::from_value(json!({"type": "weekly"}));
        assert!(result.is_err());
        assert!(matches!("weekly".parse::<JobType>(), Err(SchedulerError::InvalidJob(_))));
    }

    #[test]
    fn test_start_at_wall_clock_uses_timezone() {
        let job = Job::datetime("d", "2024-01-02 08:00:00").with_timezone("Asia/Shanghai");
        let instant = job.start_at_instant().unwrap();
        assert_eq!(instant.to_rfc3339(), "2024-01-02T00:00:00+00:00");

        let rfc = Job::datetime("d", "2024-01-02T08:00:00+08:00");
        assert_eq!(rfc.start_at_instant().unwrap(), instant);
    }

    #[test]
    fn test_check_rejects_bad_fields() {
        assert!(Job::interval("i", "soon").check().is_err());
        assert!(Job::interval("i", "0s").check().is_err());
        assert!(Job::interval("i", "1s").with_timezone("Mars/Base").check().is_err());
        assert!(Job::cron("c", "  ").check().is_err());
        assert!(Job::datetime("d", "").check().is_err());
        assert!(Job::interval("i", "1s").with_timeout("forever").check().is_err());
        assert!(Job::interval("i", "1s").check().is_ok());
    }

    #[test]
    fn test_generated_id_is_32_chars() {
        let id = Job::generate_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_paused_sentinel_value() {
        assert_eq!(paused_sentinel().to_rfc3339(), "9999-09-09T09:09:09+00:00");
    }
}
