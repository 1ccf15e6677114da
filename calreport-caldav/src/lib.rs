//! CalDAV transport for calreport.
//!
//! Talks to a single calendar collection with blocking HTTP requests:
//! a calendar-query REPORT for the window, GET for records that came
//! without data, conditional PUT for updates, DELETE and PUT for the
//! rollback.

mod client;
mod report;

pub use client::{CalDavClient, Credentials};
pub use report::{calendar_query_body, parse_calendar_resources};
