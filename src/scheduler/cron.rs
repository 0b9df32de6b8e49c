use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// Default cadence: every six hours, on the hour.
pub const DEFAULT_CRON: &str = "0 0 */6 * * *";

/// Longest preview window, one year.
pub const MAX_PREVIEW_HOURS: u64 = 24 * 366;

/// A validated cron expression for scheduled keep-alive runs.
#[derive(Debug, Clone)]
pub struct KeepaliveSchedule {
    expr: String,
    schedule: CronSchedule,
}

impl KeepaliveSchedule {
    /// Parse a cron expression (seconds field first, e.g. `0 0 */6 * * *`).
    pub fn parse(expr: &str) -> Result<Self> {
        let schedule = CronSchedule::from_str(expr.trim())
            .map_err(|e| anyhow::anyhow!("Invalid cron expression '{}': {}", expr, e))?;
        Ok(Self {
            expr: expr.trim().to_string(),
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Fire times in `(from, from + hours]`, in order.
    /// This is strictly a dry-run preview, not the execution loop.
    pub fn preview(&self, from: DateTime<Utc>, hours: u64) -> Vec<DateTime<Utc>> {
        let end = from + Duration::hours(hours.min(MAX_PREVIEW_HOURS) as i64);
        self.schedule
            .after(&from)
            .take_while(|next| *next <= end)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_default_expression_parses() {
        let schedule = KeepaliveSchedule::parse(DEFAULT_CRON).unwrap();
        assert_eq!(schedule.expr(), DEFAULT_CRON);
    }

    #[test]
    fn test_invalid_expression_is_rejected() {
        let err = KeepaliveSchedule::parse("every tuesday").unwrap_err();
        assert!(err.to_string().contains("every tuesday"));
    }

    #[test]
    fn test_next_after_is_strictly_later() {
        let schedule = KeepaliveSchedule::parse(DEFAULT_CRON).unwrap();
        assert_eq!(schedule.next_after(at(0, 0)), Some(at(6, 0)));
        assert_eq!(schedule.next_after(at(5, 59)), Some(at(6, 0)));
    }

    #[test]
    fn test_hourly_preview_over_a_day() {
        let schedule = KeepaliveSchedule::parse("0 0 * * * *").unwrap();
        let runs = schedule.preview(at(0, 30), 24);

        assert_eq!(runs.len(), 24);
        assert_eq!(runs[0], at(1, 0));
        assert!(runs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_preview_zero_hours_is_empty() {
        let schedule = KeepaliveSchedule::parse(DEFAULT_CRON).unwrap();
        assert!(schedule.preview(at(1, 0), 0).is_empty());
    }
}
