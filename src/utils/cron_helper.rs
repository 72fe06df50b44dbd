//! Cron utility functions for calculating next scheduled merge times
//!
//! Schedules are stored as cadence + time of day + weekdays and translated
//! into a six-field cron expression (`sec min hour day-of-month month
//! day-of-week`). All times are UTC.

use chrono::{DateTime, Timelike, Utc};
use cron::Schedule;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};
use crate::models::{Cadence, ScheduleConfig};

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Cron expression for a schedule. Weekly schedules with no days, or with
/// every day, fire daily.
pub fn schedule_expression(config: &ScheduleConfig) -> String {
    let minute = config.time_of_day.minute();
    let hour = config.time_of_day.hour();

    let days = match config.cadence {
        Cadence::Daily => "*".to_string(),
        Cadence::Weekly => {
            let names: Vec<&str> = config
                .days_of_week
                .iter()
                .filter_map(|d| WEEKDAY_NAMES.get(*d as usize).copied())
                .collect();
            if names.is_empty() || names.len() == WEEKDAY_NAMES.len() {
                "*".to_string()
            } else {
                names.join(",")
            }
        }
    };

    format!("0 {minute} {hour} * * {days}")
}

/// First fire time strictly after `from`
pub fn next_run_after(config: &ScheduleConfig, from: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    let expression = schedule_expression(config);
    let schedule = Schedule::from_str(&expression).map_err(|e| {
        AppError::configuration(format!("Invalid cron expression '{expression}': {e}"))
    })?;

    schedule.after(&from).next().ok_or_else(|| {
        AppError::configuration(format!("Cron expression '{expression}' has no future runs"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timeframe;
    use chrono::{NaiveTime, TimeZone};
    use std::collections::BTreeSet;

    fn config(cadence: Cadence, time: &str, days: &[u8]) -> ScheduleConfig {
        ScheduleConfig {
            cadence,
            time_of_day: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            days_of_week: days.iter().copied().collect::<BTreeSet<u8>>(),
            timeframe: Timeframe::ThreeDays,
            channels_version: "channels.json".to_string(),
            timeout_seconds: 300,
        }
    }

    #[test]
    fn test_daily_expression() {
        let expr = schedule_expression(&config(Cadence::Daily, "03:15", &[1, 2]));
        assert_eq!(expr, "0 15 3 * * *");
    }

    #[test]
    fn test_weekly_expression() {
        let expr = schedule_expression(&config(Cadence::Weekly, "00:00", &[0, 3, 6]));
        assert_eq!(expr, "0 0 0 * * Sun,Wed,Sat");

        let all = schedule_expression(&config(Cadence::Weekly, "00:00", &[0, 1, 2, 3, 4, 5, 6]));
        assert_eq!(all, "0 0 0 * * *");
    }

    #[test]
    fn test_next_daily_run() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();

        let later_today = next_run_after(&config(Cadence::Daily, "12:30", &[]), from).unwrap();
        assert_eq!(later_today, Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap());

        let tomorrow = next_run_after(&config(Cadence::Daily, "09:00", &[]), from).unwrap();
        assert_eq!(tomorrow, Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_is_strictly_after() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
        let next = next_run_after(&config(Cadence::Daily, "12:30", &[]), from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 2, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_next_weekly_run() {
        // 2025-01-01 is a Wednesday
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let next = next_run_after(&config(Cadence::Weekly, "06:00", &[1]), from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 1, 6, 6, 0, 0).unwrap());
    }
}
