//! Resolution of the Room-4 twelve-hour reporting window.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Resolved reporting window in local time and UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryWindow {
    pub window_start_local: DateTime<Tz>,
    pub window_end_local: DateTime<Tz>,
    pub window_start_utc: DateTime<Utc>,
    pub window_end_utc: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryWindowError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("unable to resolve previous summary cutoff")]
    NoEligibleCutoff,
}

/// Latest completed 12-hour window for the configured cutoffs.
///
/// The window end is the greatest `datetime(day, cutoff_hour)` at either
/// cutoff that is not after `run_at_utc` in local time; the window spans the
/// twelve hours before it.
pub fn resolve_previous_summary_window(
    run_at_utc: DateTime<Utc>,
    timezone_name: &str,
    morning_hour: u32,
    evening_hour: u32,
) -> Result<SummaryWindow, SummaryWindowError> {
    let timezone: Tz = timezone_name
        .parse()
        .map_err(|_| SummaryWindowError::InvalidTimezone(timezone_name.to_owned()))?;
    let run_at_local = run_at_utc.with_timezone(&timezone);

    let mut candidates: Vec<DateTime<Tz>> = Vec::new();
    for day_offset in [-1i64, 0] {
        let day: NaiveDate = (run_at_local + Duration::days(day_offset)).date_naive();
        for hour in [morning_hour, evening_hour] {
            let naive = day.and_hms_opt(hour, 0, 0).ok_or(SummaryWindowError::NoEligibleCutoff)?;
            if let Some(local) = timezone.from_local_datetime(&naive).earliest() {
                candidates.push(local);
            }
        }
    }

    let window_end_local = candidates
        .into_iter()
        .filter(|candidate| *candidate <= run_at_local)
        .max()
        .ok_or(SummaryWindowError::NoEligibleCutoff)?;
    let window_start_local = window_end_local - Duration::hours(12);

    Ok(SummaryWindow {
        window_start_utc: window_start_local.with_timezone(&Utc),
        window_end_utc: window_end_local.with_timezone(&Utc),
        window_start_local,
        window_end_local,
    })
}
