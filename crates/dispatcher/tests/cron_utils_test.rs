#[cfg(test)]
mod cron_utils_tests {
    use cadence_dispatcher::cron_utils::*;

    use chrono::{TimeZone, Timelike, Utc};
    use chrono_tz::Tz;

    #[test]
    fn test_cron_scheduler_creation() {
        assert!(CronScheduler::new("0 0 * * *").is_ok());
        assert!(CronScheduler::new("0 0 0 * * *").is_ok());
        assert!(CronScheduler::new("invalid").is_err());
        assert!(CronScheduler::new("").is_err());
    }

    #[test]
    fn test_next_after_is_strict() {
        let scheduler = CronScheduler::new("*/1 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = scheduler.next_after(now, Tz::UTC).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap());
    }

    #[test]
    fn test_weekday_numbers() {
        // 2024-01-06 是周六
        let saturday = Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap();
        let sunday_zero = CronScheduler::new("0 8 * * 0").unwrap();
        let sunday_seven = CronScheduler::new("0 8 * * 7").unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 1, 7, 8, 0, 0).unwrap();
        assert_eq!(sunday_zero.next_after(saturday, Tz::UTC).unwrap(), expected);
        assert_eq!(sunday_seven.next_after(saturday, Tz::UTC).unwrap(), expected);

        let weekdays = CronScheduler::new("0 8 * * 1-5").unwrap();
        let monday = Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap();
        assert_eq!(weekdays.next_after(saturday, Tz::UTC).unwrap(), monday);
    }

    #[test]
    fn test_timezone_aware_next() {
        let scheduler = CronScheduler::new("0 9 * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next = scheduler.next_after(now, Tz::America__New_York).unwrap();
        // 纽约冬令时 UTC-5
        assert_eq!(next.hour(), 14);
    }

    #[test]
    fn test_upcoming_times() {
        let scheduler = CronScheduler::new("0 0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, Tz::UTC, 3);

        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].hour(), 13);
        assert_eq!(upcoming[1].hour(), 14);
        assert_eq!(upcoming[2].hour(), 15);
    }

    #[test]
    fn test_validate() {
        assert!(CronScheduler::validate("*/5 * * * *"));
        assert!(CronScheduler::validate("0 0 9-17 * * MON-FRI"));
        assert!(!CronScheduler::validate("0 0 32 * *"));
    }

    #[test]
    fn test_day_of_month_or_weekday() {
        // 13 号或周五，2024-03-01 之后最近的是 3 月 8 日周五
        let scheduler = CronScheduler::new("0 0 13 * 5").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, Tz::UTC, 3);
        assert_eq!(
            upcoming,
            vec![
                Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 13, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
            ]
        );
    }
}
