//! Core of calreport.
//!
//! This crate holds everything between the calendar server and the
//! rendered report:
//! - `Event` and the report window
//! - RRULE expansion (`recurrence`)
//! - reading records (`ics`), normalizing and filtering events
//! - marking reported recurring events as seen, with rollback (`seen`)
//! - sorting and grouping per day (`grouping`)
//! - the `CalendarTransport` seam implemented by `calreport-caldav`

pub mod constants;
pub mod error;
pub mod event;
pub mod filter;
pub mod grouping;
pub mod ics;
#[cfg(test)]
mod memory;
pub mod normalize;
pub mod pipeline;
pub mod recurrence;
pub mod remote;
pub mod seen;
pub mod settings;
pub mod window;

pub use error::{CalReportError, CalReportResult};
pub use event::{Event, RawEvent, RawStart};
pub use grouping::{DayGroup, DayGroups, Report};
pub use pipeline::collect_events;
pub use remote::{CalendarHandle, CalendarTransport, RemoteRecord};
pub use settings::{RunSettings, SettingsFile, TemplateSettings};
pub use window::ReportWindow;
