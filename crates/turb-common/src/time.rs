//! Request time parsing and availability checks.
//!
//! Reanalysis archives trail real time; the window here rejects requests
//! newer than the archive can serve before any network call is made.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::TurbError;

/// Parse a `YYYY-MM-DD` date and `HH:MM` time into a UTC timestamp.
///
/// The minute component must be zero: the pressure-level archive is sampled
/// hourly, and silently snapping to the hour would return a different product
/// than the user asked for.
pub fn parse_request_datetime(date: &str, time: &str) -> Result<DateTime<Utc>, TurbError> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| TurbError::InvalidRequest(format!("\"{}\" is not a YYYY-MM-DD date", date)))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .map_err(|_| TurbError::InvalidRequest(format!("\"{}\" is not an HH:MM time", time)))?;

    if time.minute() != 0 {
        return Err(TurbError::InvalidRequest(format!(
            "time {} is not a whole hour; data is available hourly",
            time.format("%H:%M")
        )));
    }

    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

/// How far behind real time the archive runs.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityWindow {
    latency: Duration,
}

impl AvailabilityWindow {
    pub fn new(latency_days: i64) -> Self {
        Self {
            latency: Duration::days(latency_days),
        }
    }

    /// Newest timestamp the archive is expected to hold, snapped down to the
    /// whole hour.
    pub fn newest_available(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let newest = now - self.latency;
        newest
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(newest)
    }

    /// Reject timestamps the archive cannot serve yet.
    pub fn validate(&self, requested: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), TurbError> {
        let newest = self.newest_available(now);
        if requested > newest {
            return Err(TurbError::InvalidRequest(format!(
                "{} is too recent; the newest available time is {}",
                requested.format("%Y-%m-%d %H:%M UTC"),
                newest.format("%Y-%m-%d %H:%M UTC")
            )));
        }
        Ok(())
    }
}

impl Default for AvailabilityWindow {
    /// ERA5 publishes daily with roughly five days of latency.
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_datetime() {
        let dt = parse_request_datetime("2024-11-24", "10:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 11, 24, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_partial_hours() {
        let err = parse_request_datetime("2024-11-24", "10:30").unwrap_err();
        match err {
            TurbError::InvalidRequest(msg) => assert!(msg.contains("whole hour")),
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_request_datetime("24-11-2024", "10:00").is_err());
        assert!(parse_request_datetime("2024-11-24", "25:00").is_err());
        assert!(parse_request_datetime("2024-13-01", "00:00").is_err());
    }

    #[test]
    fn test_window_rejects_recent_timestamps() {
        let window = AvailabilityWindow::new(5);
        let now = Utc.with_ymd_and_hms(2024, 11, 30, 12, 30, 0).unwrap();

        // Five days back, snapped to the hour.
        let newest = window.newest_available(now);
        assert_eq!(newest, Utc.with_ymd_and_hms(2024, 11, 25, 12, 0, 0).unwrap());

        assert!(window
            .validate(Utc.with_ymd_and_hms(2024, 11, 24, 10, 0, 0).unwrap(), now)
            .is_ok());
        assert!(window.validate(newest, now).is_ok());
        assert!(window
            .validate(Utc.with_ymd_and_hms(2024, 11, 28, 0, 0, 0).unwrap(), now)
            .is_err());
        assert!(window
            .validate(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), now)
            .is_err());
    }
}
