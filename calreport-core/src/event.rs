//! Normalized event types.
//!
//! An [`Event`] is what the rest of calreport works with once a remote
//! record has been read and its recurrence resolved against the report
//! window. Renderers consume these values as-is.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;

/// A calendar event, normalized to the local timezone of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Start of the event (for recurring events: the occurrence closest to
    /// the window start). `None` when a recurrence has no occurrence in range.
    pub starting: Option<DateTime<Tz>>,
    pub summary: Option<String>,
    pub location: Option<String>,
    /// Date-only event; `starting` is local midnight of that date.
    pub is_fullday: bool,
    /// DESCRIPTION
    pub more: Option<String>,
    /// Uppercase STATUS token
    pub status: Option<String>,
    /// Raw RRULE value; `None` for single events
    pub rrule: Option<String>,
    /// DTSTART of the series, in the zone the calendar data uses.
    /// Only set for recurring events.
    pub series_start: Option<DateTime<Tz>>,
}

impl Event {
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    pub fn start(&self) -> Option<&DateTime<Tz>> {
        self.starting.as_ref()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.summary {
            Some(summary) => write!(f, "{}", summary),
            None => write!(f, "(No title)"),
        }
    }
}

/// Start of a record as found in the calendar data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawStart {
    Date(NaiveDate),
    DateTime(DateTime<Tz>),
}

/// The fixed field set read from a remote record, before normalization.
///
/// Absent properties stay `None`; present-but-empty ones are `Some("")`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    pub uid: Option<String>,
    pub start: Option<RawStart>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub rrule: Option<String>,
}
