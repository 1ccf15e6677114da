/// Occurrence bound injected into rules that carry neither UNTIL nor COUNT.
pub const DEFAULT_OCCURRENCE_COUNT: u32 = 20;

/// Report length in days when no explicit end date is given.
pub const DEFAULT_DAY_SPAN: i64 = 14;

/// Status written to recurring events once they have been reported.
pub const DEFAULT_SEEN_STATUS: &str = "TENTATIVE";

/// Consecutive failed seen-markings that end a run.
pub const DEFAULT_FAILURE_CEILING: u32 = 2;

/// Statuses that keep an event out of the report.
pub const SKIPPED_STATUSES: [&str; 2] = ["CANCELLED", "TENTATIVE"];

pub const DEFAULT_DAY_HEADER: &str = "%a, %d.%m";

pub const DEFAULT_STARTING_TIME: &str = "%H:%M";

pub const DEFAULT_PASSWORD_ENV: &str = "CALREPORT_PASSWORD";

/// Hard cap on occurrences pulled out of the expansion engine per rule.
pub const MAX_EXPANDED_OCCURRENCES: u16 = u16::MAX;
