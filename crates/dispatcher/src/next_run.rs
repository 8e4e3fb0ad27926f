//! 任务下次触发时间计算

use cadence_core::{paused_sentinel, Job, JobType, SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};

use crate::cron_utils::CronScheduler;

/// 新增、更新或恢复任务时计算 `next_run_time`
///
/// - 暂停的任务返回哨兵时间
/// - `datetime` 返回 `start_at`（可能已经过去，此时下一轮立即触发）
/// - `interval` 返回 `now + interval`
/// - `cron` 返回任务时区内严格晚于 `now` 的下一次匹配
pub fn calc_next_run_time(job: &Job, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
    if job.is_paused() {
        return Ok(paused_sentinel());
    }
    match job.job_type {
        JobType::Datetime => job.start_at_instant(),
        JobType::Interval => {
            let interval = to_chrono(job.interval_duration()?)?;
            Ok(now + interval)
        }
        JobType::Cron => next_cron_fire(job, now),
    }
}

/// 一次触发之后推进 `next_run_time`
///
/// 周期任务跳过所有已错过的触发，只保留严格晚于 `now` 的第一个时刻。
pub fn next_fire_after(job: &Job, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
    match job.job_type {
        JobType::Datetime => job.start_at_instant(),
        JobType::Interval => {
            let interval = job.interval_duration()?;
            let step = interval.as_nanos() as i128;
            let base = job.next_run_time;
            let behind = (now - base).num_nanoseconds().map(i128::from).unwrap_or(i128::MAX);
            let steps = if behind < 0 { 1 } else { behind / step + 1 };
            let advance = step.saturating_mul(steps);
            let advance = i64::try_from(advance)
                .map_err(|_| SchedulerError::InvalidJob(format!("间隔过大: {}", job.interval)))?;
            Ok(base + chrono::Duration::nanoseconds(advance))
        }
        JobType::Cron => next_cron_fire(job, now),
    }
}

fn next_cron_fire(job: &Job, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
    let tz = job.location()?;
    let schedule = CronScheduler::new(&job.cron_expr)?;
    schedule.next_after(now, tz).ok_or_else(|| {
        SchedulerError::InvalidJob(format!("cron 表达式 '{}' 没有后续触发时间", job.cron_expr))
    })
}

fn to_chrono(duration: std::time::Duration) -> SchedulerResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| SchedulerError::InvalidJob(format!("时长超出范围: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::JobStatus;
    use chrono::{TimeZone, Timelike};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_interval_first_fire() {
        let job = Job::interval("tick", "2s");
        assert_eq!(calc_next_run_time(&job, at(10, 0, 0)).unwrap(), at(10, 0, 2));
    }

    #[test]
    fn test_interval_skips_missed_fires() {
        let mut job = Job::interval("tick", "10s");
        job.next_run_time = at(10, 0, 0);
        // 错过 3 次后只补一次
        assert_eq!(next_fire_after(&job, at(10, 0, 35)).unwrap(), at(10, 0, 40));
        assert_eq!(next_fire_after(&job, at(10, 0, 0)).unwrap(), at(10, 0, 10));
    }

    #[test]
    fn test_cron_day_of_month_or_weekday() {
        let job = Job::cron("c", "0 0 13 * 5");
        let next = calc_next_run_time(&job, at(0, 0, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_paused_returns_sentinel() {
        let mut job = Job::interval("tick", "1s");
        job.status = JobStatus::Paused;
        assert_eq!(calc_next_run_time(&job, at(10, 0, 0)).unwrap(), paused_sentinel());
    }

    #[test]
    fn test_cron_respects_timezone() {
        let job = Job::cron("daily", "0 9 * * *").with_timezone("Asia/Shanghai");
        let next = calc_next_run_time(&job, at(0, 30, 0)).unwrap();
        assert_eq!(next.hour(), 1);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_cron_strictly_after_now() {
        let job = Job::cron("minutely", "* * * * *");
        assert_eq!(calc_next_run_time(&job, at(10, 1, 0)).unwrap(), at(10, 2, 0));
    }

    #[test]
    fn test_datetime_wall_clock() {
        let job = Job::datetime("once", "2024-03-01 18:00:00").with_timezone("Asia/Shanghai");
        assert_eq!(calc_next_run_time(&job, at(0, 0, 0)).unwrap(), at(10, 0, 0));
    }

    #[test]
    fn test_invalid_cron_rejected() {
        let job = Job::cron("bad", "not a cron");
        assert!(matches!(
            calc_next_run_time(&job, at(0, 0, 0)),
            Err(SchedulerError::InvalidJob(_))
        ));
    }
}
