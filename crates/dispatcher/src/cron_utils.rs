use std::str::FromStr;

use cadence_core::{SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::debug;

const WEEKDAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// 时区感知的 cron 表达式
///
/// 接受标准 5 段表达式（分 时 日 月 周，周日为 0 或 7），
/// 也接受带秒的 6/7 段表达式。日字段与星期字段同时受限时，
/// 任一字段匹配即触发。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expr: String,
    schedules: Vec<Schedule>,
}

impl CronScheduler {
    pub fn new(cron_expr: &str) -> SchedulerResult<Self> {
        let normalized = normalize_expression(cron_expr)?;
        let schedules = split_day_fields(&normalized)
            .iter()
            .map(|expr| {
                Schedule::from_str(expr).map_err(|e| {
                    SchedulerError::InvalidJob(format!("无效的 cron 表达式 '{cron_expr}': {e}"))
                })
            })
            .collect::<SchedulerResult<Vec<_>>>()?;
        debug!("cron 表达式 '{}' 规范化为 '{}'", cron_expr, normalized);
        Ok(Self {
            expr: cron_expr.trim().to_string(),
            schedules,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// 在时区 `tz` 中求严格晚于 `after` 的下一次触发时刻
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&tz);
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&local).next())
            .map(|t| t.with_timezone(&Utc))
            .min()
    }

    /// 获取接下来的 n 次触发时刻
    pub fn upcoming_times(&self, after: DateTime<Utc>, tz: Tz, count: usize) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = after;
        while times.len() < count {
            let Some(next) = self.next_after(cursor, tz) else {
                break;
            };
            times.push(next);
            cursor = next;
        }
        times
    }

    pub fn validate(cron_expr: &str) -> bool {
        Self::new(cron_expr).is_ok()
    }
}

/// 5 段表达式补秒字段并把数字星期转换为名称
fn normalize_expression(expr: &str) -> SchedulerResult<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => {
            let weekday = normalize_weekday(fields[4])?;
            Ok(format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], fields[2], fields[3], weekday
            ))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(SchedulerError::InvalidJob(format!(
            "cron 表达式需要 5 到 7 个字段，实际 {n} 个: '{expr}'"
        ))),
    }
}

/// 日与星期字段都受限时拆成两条表达式，分别只保留其中一个限制
fn split_day_fields(normalized: &str) -> Vec<String> {
    let fields: Vec<&str> = normalized.split_whitespace().collect();
    let restricted = |f: &str| !f.starts_with('*') && f != "?";
    if fields.len() < 6 || !restricted(fields[3]) || !restricted(fields[5]) {
        return vec![normalized.to_string()];
    }
    let mut by_day = fields.clone();
    by_day[5] = "*";
    let mut by_weekday = fields;
    by_weekday[3] = "*";
    vec![by_day.join(" "), by_weekday.join(" ")]
}

fn normalize_weekday(field: &str) -> SchedulerResult<String> {
    let mut names: Vec<&str> = Vec::new();
    let mut passthrough: Vec<&str> = Vec::new();

    for part in field.split(',') {
        if part.starts_with('*') || part == "?" || part.chars().any(|c| c.is_ascii_alphabetic()) {
            passthrough.push(part);
            continue;
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, parse_weekday_number(step, field)?.max(1)),
            None => (part, 1),
        };
        let (start, end) = match range.split_once('-') {
            Some((a, b)) => (parse_weekday_number(a, field)?, parse_weekday_number(b, field)?),
            None if part.contains('/') => (parse_weekday_number(range, field)?, 7),
            None => {
                let day = parse_weekday_number(range, field)?;
                (day, day)
            }
        };
        if start > end || end > 7 {
            return Err(SchedulerError::InvalidJob(format!("无效的星期字段: '{field}'")));
        }
        for day in (start..=end).step_by(step) {
            let name = WEEKDAY_NAMES[day];
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut out: Vec<&str> = passthrough;
    out.extend(names);
    Ok(out.join(","))
}

fn parse_weekday_number(raw: &str, field: &str) -> SchedulerResult<usize> {
    raw.parse::<usize>()
        .map_err(|_| SchedulerError::InvalidJob(format!("无效的星期字段: '{field}'")))
}
