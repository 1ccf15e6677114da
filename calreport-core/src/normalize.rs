//! Turning raw record fields into normalized [`Event`]s.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::event::{Event, RawEvent, RawStart};
use crate::recurrence::next_occurrence;
use crate::window::{ReportWindow, local_midnight};

/// Build the canonical event for a record.
///
/// Recurring events get the occurrence closest to the window start as
/// their `starting`; when there is none (or the rule can't be expanded)
/// `starting` stays empty and the event is dropped by the filter.
pub fn normalize(raw: RawEvent, window: &ReportWindow, tz: Tz) -> Event {
    let summary = trimmed(raw.summary);
    let label = summary.as_deref().unwrap_or("(No title)");

    let (series_start, is_fullday) = match raw.start {
        Some(RawStart::Date(date)) => match local_midnight(date, tz) {
            Ok(midnight) => (Some(midnight), true),
            Err(e) => {
                tracing::warn!(summary = label, error = %e, "Could not place full-day event");
                (None, true)
            }
        },
        Some(RawStart::DateTime(dt)) => (Some(dt), false),
        None => (None, false),
    };

    let starting = match (&raw.rrule, series_start) {
        (Some(rrule), Some(first)) => occurrence_in_window(label, &first, rrule, window),
        (_, start) => start,
    };

    tracing::debug!(summary = label, "Assembled event");

    Event {
        starting: starting.map(|s| s.with_timezone(&tz)),
        summary,
        location: trimmed(raw.location),
        is_fullday,
        more: trimmed(raw.description),
        status: trimmed(raw.status).map(|s| s.to_ascii_uppercase()),
        series_start: raw.rrule.as_ref().and(series_start),
        rrule: trimmed(raw.rrule),
    }
}

fn occurrence_in_window(
    label: &str,
    first: &DateTime<Tz>,
    rrule: &str,
    window: &ReportWindow,
) -> Option<DateTime<Tz>> {
    match next_occurrence(first, rrule, window) {
        Ok(next) => next,
        Err(e) => {
            tracing::warn!(summary = label, rrule, error = %e, "Dropping recurrence");
            None
        }
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}
