use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;

use crate::error::{Result, SchedulerError};

/// Parse a standard 5-field cron expression (minute hour day-of-month month
/// day-of-week). The `cron` crate expects a leading seconds field, so `0 `
/// is prefixed before handing the expression to it.
pub fn parse_cron(expression: &str) -> Result<CronSchedule> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(SchedulerError::InvalidSchedule(format!(
            "expected 5 fields (minute hour day-of-month month day-of-week), got {}: {expression}",
            fields.len()
        )));
    }
    let with_seconds = format!("0 {expression}");
    CronSchedule::from_str(&with_seconds)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("{expression}: {e}")))
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    Tz::from_str(name).map_err(|e| SchedulerError::InvalidSchedule(format!("unknown timezone {name}: {e}")))
}

/// Compute the next UTC fire time for `cron_expression`/`timezone` strictly
/// after `from`.
pub fn compute_next_run(cron_expression: &str, timezone: &str, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let schedule = parse_cron(cron_expression)?;
    let tz = parse_timezone(timezone)?;
    let from_in_tz = from.with_timezone(&tz);
    Ok(schedule.after(&from_in_tz).next().map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rejects_expressions_with_wrong_field_count() {
        assert!(parse_cron("* * * *").is_err());
        assert!(parse_cron("* * * * * *").is_err());
    }

    #[test]
    fn every_minute_fires_one_minute_later() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let next = compute_next_run("* * * * *", "UTC", from).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 1, 0).unwrap());
    }

    #[test]
    fn daily_nine_am_denver_converts_to_utc() {
        let from = Utc.with_ymd_and_hms(2026, 7, 27, 0, 0, 0).unwrap();
        let next = compute_next_run("0 9 * * *", "America/Denver", from).unwrap().unwrap();
        // America/Denver is UTC-6 during daylight saving time in July.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 27, 15, 0, 0).unwrap());
    }

    #[test]
    fn step_values_are_supported() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = compute_next_run("*/15 * * * *", "UTC", from).unwrap().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 0, 15, 0).unwrap());
    }

    #[test]
    fn unknown_timezone_errors() {
        assert!(compute_next_run("* * * * *", "Mars/Olympus", Utc::now()).is_err());
    }
}
