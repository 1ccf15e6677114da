//! Deciding which normalized events belong in the report.

use std::fmt;

use crate::constants::SKIPPED_STATUSES;
use crate::event::Event;
use crate::window::ReportWindow;

/// Why an event was left out of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Status contains CANCELLED or TENTATIVE (which includes events we
    /// marked as seen earlier)
    Status(String),
    /// Recurring event without an occurrence in the window
    NoOccurrence,
    /// Single event without a start
    NoStart,
    /// Start outside the window (servers may over-return)
    OutsideWindow,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Status(status) => write!(f, "status is {}", status),
            SkipReason::NoOccurrence => write!(f, "no occurrence in the report window"),
            SkipReason::NoStart => write!(f, "no start time"),
            SkipReason::OutsideWindow => write!(f, "starts outside the report window"),
        }
    }
}

/// The first reason (in check order) to leave `event` out, if any.
pub fn skip_reason(event: &Event, window: &ReportWindow) -> Option<SkipReason> {
    if let Some(status) = &event.status {
        let upper = status.to_ascii_uppercase();
        if SKIPPED_STATUSES.iter().any(|s| upper.contains(s)) {
            return Some(SkipReason::Status(status.clone()));
        }
    }

    match &event.starting {
        None if event.is_recurring() => Some(SkipReason::NoOccurrence),
        None => Some(SkipReason::NoStart),
        Some(starting) if !window.contains(starting) => Some(SkipReason::OutsideWindow),
        Some(_) => None,
    }
}

pub fn is_skippable(event: &Event, window: &ReportWindow) -> bool {
    skip_reason(event, window).is_some()
}
