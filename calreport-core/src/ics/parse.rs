//! ICS record parsing using the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, read_calendar, unfold},
};

use crate::error::{CalReportError, CalReportResult};
use crate::event::{RawEvent, RawStart};

/// Read the fixed field set of a record's main VEVENT.
///
/// The main VEVENT is the first one without a RECURRENCE-ID (overridden
/// instances of a series live in the same resource). Floating times and
/// unknown TZIDs are read in `local_tz`.
pub fn parse_record(content: &str, local_tz: Tz) -> CalReportResult<RawEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| CalReportError::IcsParse(format!("Failed to read calendar data: {}", e)))?;
    let vevent = main_vevent(&calendar.components)
        .ok_or_else(|| CalReportError::IcsParse("No VEVENT in calendar data".to_string()))?;

    let text = |name: &str| vevent.find_prop(name).map(|p| unescape_text(p.val.as_ref()));

    let start = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|dpt| to_raw_start(dpt, local_tz));

    Ok(RawEvent {
        uid: vevent.find_prop("UID").map(|p| p.val.to_string()),
        start,
        summary: text("SUMMARY"),
        location: text("LOCATION"),
        description: text("DESCRIPTION"),
        status: vevent
            .find_prop("STATUS")
            .map(|p| p.val.as_ref().trim().to_ascii_uppercase()),
        rrule: vevent.find_prop("RRULE").map(|p| p.val.to_string()),
    })
}

/// UID of a record's main VEVENT, if the data can be read at all.
pub fn record_uid(content: &str) -> Option<String> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = main_vevent(&calendar.components)?;
    vevent.find_prop("UID").map(|p| p.val.to_string())
}

fn main_vevent<'a, 'c>(components: &'c [Component<'a>]) -> Option<&'c Component<'a>> {
    let mut vevents = components.iter().filter(|c| c.name == "VEVENT");
    let first = vevents.clone().next();
    vevents
        .find(|c| c.find_prop("RECURRENCE-ID").is_none())
        .or(first)
}

/// Convert icalendar's DatePerhapsTime to a zoned start
fn to_raw_start(dpt: DatePerhapsTime, local_tz: Tz) -> RawStart {
    match dpt {
        DatePerhapsTime::Date(date) => RawStart::Date(date),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => RawStart::DateTime(dt.with_timezone(&Tz::UTC)),
            CalendarDateTime::Floating(naive) => RawStart::DateTime(in_zone(&naive, local_tz)),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                let tz = tzid.trim_matches('"').parse::<Tz>().unwrap_or_else(|_| {
                    tracing::warn!(%tzid, local = local_tz.name(), "Unknown TZID, reading start in local timezone");
                    local_tz
                });
                RawStart::DateTime(in_zone(&date_time, tz))
            }
        },
    }
}

/// Resolve a wall-clock time in `tz`; times skipped by DST move forward
/// by the size of the gap (read with the offset from before the gap).
fn in_zone(naive: &NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    (0..=2)
        .find_map(|hours| {
            tz.from_local_datetime(&(*naive + Duration::hours(hours)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(naive))
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
