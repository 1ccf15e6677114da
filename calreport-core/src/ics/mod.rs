//! Reading and editing the iCalendar data of remote records.
//!
//! This is the only place that knows what a remote record looks like.

mod parse;
mod status;

pub use parse::{parse_record, record_uid};
pub use status::set_status;
