//! The remote calendar as seen by the core.
//!
//! A transport (e.g. the CalDAV client in `calreport-caldav`) implements
//! [`CalendarTransport`]; the pipeline and the seen-marker only ever talk
//! to the calendar through it.

use crate::error::{CalReportError, CalReportResult};
use crate::ics;
use crate::window::ReportWindow;

/// One calendar resource on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Location of the resource, as reported by the server
    pub href: String,
    /// Entity tag for conditional updates
    pub etag: Option<String>,
    /// iCalendar data, `None` until loaded
    pub data: Option<String>,
}

impl RemoteRecord {
    pub fn new(href: impl Into<String>) -> Self {
        RemoteRecord {
            href: href.into(),
            etag: None,
            data: None,
        }
    }

    pub fn with_data(href: impl Into<String>, etag: Option<String>, data: impl Into<String>) -> Self {
        RemoteRecord {
            href: href.into(),
            etag,
            data: Some(data.into()),
        }
    }

    /// The loaded calendar data.
    pub fn loaded_data(&self) -> CalReportResult<&str> {
        self.data.as_deref().ok_or_else(|| {
            CalReportError::Transport(format!("Record {} has not been loaded", self.href))
        })
    }
}

/// The calendar collection records live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarHandle {
    pub url: String,
}

impl CalendarHandle {
    pub fn new(url: impl Into<String>) -> Self {
        CalendarHandle { url: url.into() }
    }

    /// Resource location for a new record with `uid`. The UID is
    /// percent-encoded, so it always stays one path segment.
    pub fn event_href(&self, uid: &str) -> String {
        let base = self.url.trim_end_matches('/');
        format!("{}/{}.ics", base, urlencoding::encode(uid))
    }
}

/// Blocking access to a remote calendar.
///
/// Every call is a single request; there are no retries. Errors carry
/// enough context to tell which call failed.
pub trait CalendarTransport {
    /// Records with events overlapping `window`.
    fn query(&self, window: &ReportWindow) -> CalReportResult<Vec<RemoteRecord>>;

    /// Fetch the calendar data of `record` if it is not loaded yet.
    fn load(&self, record: &mut RemoteRecord) -> CalReportResult<()>;

    /// Canonical text of the record, used to recreate it verbatim.
    fn serialize(&self, record: &RemoteRecord) -> CalReportResult<String> {
        record.loaded_data().map(str::to_string)
    }

    /// Set (or add) STATUS on the loaded data. Local only; see [`persist`].
    ///
    /// [`persist`]: CalendarTransport::persist
    fn set_status_field(&self, record: &mut RemoteRecord, token: &str) -> CalReportResult<()> {
        let edited = ics::set_status(record.loaded_data()?, token)?;
        record.data = Some(edited);
        Ok(())
    }

    /// Write the record's current data back to the server.
    fn persist(&self, record: &RemoteRecord) -> CalReportResult<()>;

    fn delete(&self, record: &RemoteRecord) -> CalReportResult<()>;

    /// Create a record in `calendar` from serialized data.
    fn recreate(&self, calendar: &CalendarHandle, data: &str) -> CalReportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_href_joins_without_double_slash() {
        let calendar = CalendarHandle::new("https://dav.example.org/calendars/me/work/");

        assert_eq!(
            calendar.event_href("abc-123"),
            "https://dav.example.org/calendars/me/work/abc-123.ics"
        );
    }

    #[test]
    fn test_event_href_encodes_uid() {
        let calendar = CalendarHandle::new("/calendars/me/work/");

        assert_eq!(
            calendar.event_href("a/b#c?d e@example.org"),
            "/calendars/me/work/a%2Fb%23c%3Fd%20e%40example.org.ics"
        );
    }

    #[test]
    fn test_unloaded_record_has_no_data() {
        let record = RemoteRecord::new("/calendars/me/work/abc.ics");

        assert!(matches!(record.loaded_data(), Err(CalReportError::Transport(_))));
    }
}
