//! In-memory calendar used by the tests.

use std::cell::{Cell, RefCell};

use crate::error::{CalReportError, CalReportResult};
use crate::ics;
use crate::remote::{CalendarHandle, CalendarTransport, RemoteRecord};
use crate::window::ReportWindow;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Query,
    Load(String),
    Persist(String),
    Delete(String),
    Recreate(String),
}

/// Records every call; failures are injected per operation.
#[derive(Default)]
pub(crate) struct MemoryCalendar {
    records: RefCell<Vec<RemoteRecord>>,
    calls: RefCell<Vec<Call>>,
    /// Hand out records without data so `load` has to fetch it
    pub(crate) lazy: bool,
    /// Number of upcoming `persist` calls that fail
    pub(crate) persist_failures: Cell<u32>,
    pub(crate) fail_delete: Cell<bool>,
    pub(crate) query_error: RefCell<Option<CalReportError>>,
}

impl MemoryCalendar {
    pub(crate) fn with_events(events: &[(&str, &str)]) -> Self {
        let calendar = MemoryCalendar::default();
        for (href, data) in events {
            calendar
                .records
                .borrow_mut()
                .push(RemoteRecord::with_data(*href, Some("\"1\"".to_string()), *data));
        }
        calendar
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub(crate) fn data(&self, href: &str) -> Option<String> {
        self.records
            .borrow()
            .iter()
            .find(|r| r.href == href)
            .and_then(|r| r.data.clone())
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl CalendarTransport for MemoryCalendar {
    fn query(&self, _window: &ReportWindow) -> CalReportResult<Vec<RemoteRecord>> {
        self.record(Call::Query);
        if let Some(error) = self.query_error.borrow_mut().take() {
            return Err(error);
        }
        Ok(self
            .records
            .borrow()
            .iter()
            .map(|r| if self.lazy { RemoteRecord::new(r.href.clone()) } else { r.clone() })
            .collect())
    }

    fn load(&self, record: &mut RemoteRecord) -> CalReportResult<()> {
        self.record(Call::Load(record.href.clone()));
        if record.data.is_none() {
            record.data = self.data(&record.href);
        }
        record.loaded_data().map(|_| ())
    }

    fn persist(&self, record: &RemoteRecord) -> CalReportResult<()> {
        self.record(Call::Persist(record.href.clone()));
        let failures = self.persist_failures.get();
        if failures > 0 {
            self.persist_failures.set(failures - 1);
            return Err(CalReportError::Http {
                status: 412,
                body: "Precondition Failed".to_string(),
            });
        }
        let mut records = self.records.borrow_mut();
        let stored = records
            .iter_mut()
            .find(|r| r.href == record.href)
            .ok_or_else(|| CalReportError::NotFound(record.href.clone()))?;
        stored.data = record.data.clone();
        Ok(())
    }

    fn delete(&self, record: &RemoteRecord) -> CalReportResult<()> {
        self.record(Call::Delete(record.href.clone()));
        if self.fail_delete.get() {
            return Err(CalReportError::Transport("connection reset".to_string()));
        }
        self.records.borrow_mut().retain(|r| r.href != record.href);
        Ok(())
    }

    fn recreate(&self, calendar: &CalendarHandle, data: &str) -> CalReportResult<()> {
        let uid = ics::record_uid(data)
            .ok_or_else(|| CalReportError::IcsParse("Record has no UID".to_string()))?;
        let href = calendar.event_href(&uid);
        self.record(Call::Recreate(href.clone()));
        self.records
            .borrow_mut()
            .push(RemoteRecord::with_data(href, None, data));
        Ok(())
    }
}
