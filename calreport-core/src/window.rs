//! The time window a run reports on.

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CalReportError, CalReportResult};

/// Inclusive `[start, end]` range in the local timezone of the run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> CalReportResult<Self> {
        if end < start {
            return Err(CalReportError::InvalidWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(ReportWindow { start, end })
    }

    /// Window from `from` (local midnight) to the end of `to`, or to local
    /// midnight `day_span` calendar days after `from` when no end date is
    /// given.
    pub fn from_dates(
        from: NaiveDate,
        to: Option<NaiveDate>,
        day_span: i64,
        tz: Tz,
    ) -> CalReportResult<Self> {
        let start = local_midnight(from, tz)?;
        let end = match to {
            Some(to) => local_end_of_day(to, tz)?,
            None => local_midnight(add_days(from, day_span)?, tz)?,
        };
        ReportWindow::new(start, end)
    }

    /// Parse YYYY-MM-DD command line arguments into a window.
    pub fn from_args(
        from: &str,
        to: Option<&str>,
        day_span: i64,
        tz: Tz,
    ) -> CalReportResult<Self> {
        let from = parse_date(from)?;
        let to = to.map(parse_date).transpose()?;
        ReportWindow::from_dates(from, to, day_span, tz)
    }

    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    pub fn timezone(&self) -> Tz {
        self.start.timezone()
    }

    /// Window bounds in CalDAV time-range format (`YYYYMMDDTHHMMSSZ`).
    pub fn to_caldav_range(&self) -> (String, String) {
        let format = |dt: &DateTime<Tz>| dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ").to_string();
        (format(&self.start), format(&self.end))
    }
}

/// Midnight of `date` in `tz`.
///
/// Zones that skip midnight on a DST change get the first valid instant
/// of that day instead.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> CalReportResult<DateTime<Tz>> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=2)
        .find_map(|hours| {
            tz.from_local_datetime(&(midnight + Duration::hours(hours)))
                .earliest()
        })
        .ok_or_else(|| {
            CalReportError::Config(format!("No valid local time on {} in {}", date, tz.name()))
        })
}

fn add_days(date: NaiveDate, days: i64) -> CalReportResult<NaiveDate> {
    u64::try_from(days)
        .ok()
        .and_then(|days| date.checked_add_days(Days::new(days)))
        .ok_or_else(|| {
            CalReportError::Config(format!(
                "report.day_span {} is out of range for a window starting {}",
                days, date
            ))
        })
}

fn local_end_of_day(date: NaiveDate, tz: Tz) -> CalReportResult<DateTime<Tz>> {
    let next_day = date.succ_opt().ok_or_else(|| {
        CalReportError::Config(format!("Date {} is out of range", date))
    })?;
    Ok(local_midnight(next_day, tz)? - Duration::seconds(1))
}

fn parse_date(s: &str) -> CalReportResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        CalReportError::Config(format!(
            "Invalid date format '{}'. Expected YYYY-MM-DD, e.g. 2020-01-01",
            s
        ))
    })
}
