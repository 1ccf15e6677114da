//! RRULE expansion for recurring events.
//!
//! Only FREQ, INTERVAL, UNTIL and COUNT get special treatment here; every
//! other part of the rule is handed to the `rrule` crate untouched.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rrule::{RRule, Unvalidated};

use crate::constants::{DEFAULT_OCCURRENCE_COUNT, MAX_EXPANDED_OCCURRENCES};
use crate::error::{CalReportError, CalReportResult};
use crate::window::ReportWindow;

/// Split a rule into `(KEY, value)` pairs, keys uppercased.
fn rule_parts(rrule: &str) -> Vec<(String, String)> {
    let rrule = rrule.trim();
    let rrule = rrule.strip_prefix("RRULE:").unwrap_or(rrule);

    rrule
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.trim().to_ascii_uppercase(), value.trim().to_string()),
            None => (part.to_ascii_uppercase(), String::new()),
        })
        .collect()
}

fn join_parts(parts: &[(String, String)]) -> String {
    parts
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(";")
}

fn is_bounded(parts: &[(String, String)]) -> bool {
    parts.iter().any(|(key, _)| key == "UNTIL" || key == "COUNT")
}

/// UNTIL of a prepared rule.
fn until_of(prepared: &str) -> Option<DateTime<Utc>> {
    let (_, until) = rule_parts(prepared).into_iter().find(|(key, _)| key == "UNTIL")?;
    NaiveDateTime::parse_from_str(&until, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|until| until.and_utc())
}

/// Rewrite a rule so the expansion is well-defined and finite.
///
/// - UNTIL always carries a UTC marker (a bare date runs to the end of that day)
/// - rules without UNTIL and COUNT get `COUNT=20`
pub fn prepare_rrule(rrule: &str) -> String {
    let mut parts = rule_parts(rrule);

    if let Some((_, until)) = parts.iter_mut().find(|(key, _)| key == "UNTIL") {
        if !until.ends_with('Z') {
            if until.len() == 8 && until.chars().all(|c| c.is_ascii_digit()) {
                until.push_str("T235959Z");
            } else {
                until.push('Z');
            }
        }
    }

    if !is_bounded(&parts) {
        parts.push(("COUNT".to_string(), DEFAULT_OCCURRENCE_COUNT.to_string()));
    }

    join_parts(&parts)
}

/// Expand `rrule` starting at `starting` and keep the occurrences inside
/// `window` (or at/after its start when `include_after_window_end` is set).
///
/// Occurrences are computed in the timezone of `starting` so wall-clock
/// times survive DST changes. An empty result is a normal outcome.
pub fn expand(
    starting: &DateTime<Tz>,
    rrule: &str,
    window: &ReportWindow,
    include_after_window_end: bool,
) -> CalReportResult<Vec<DateTime<Tz>>> {
    let prepared = prepare_rrule(rrule);

    // the rrule crate rejects such a rule; it simply never fires
    if until_of(&prepared).is_some_and(|until| until < *starting) {
        tracing::debug!(rrule, %starting, "Series ends before it starts");
        return Ok(Vec::new());
    }

    let rule: RRule<Unvalidated> = prepared.parse().map_err(|e| {
        CalReportError::Recurrence(format!("Failed to parse RRULE '{}': {}", rrule, e))
    })?;

    let event_tz = starting.timezone();
    let dt_start = starting.with_timezone(&rrule::Tz::Tz(event_tz));
    let mut rrule_set = rule.build(dt_start).map_err(|e| {
        CalReportError::Recurrence(format!("Invalid RRULE '{}': {}", rrule, e))
    })?;

    // after/before are exclusive; widen by a second and filter exactly below.
    let tz = rrule::Tz::UTC;
    rrule_set = rrule_set.after((window.start - Duration::seconds(1)).with_timezone(&tz));
    if !include_after_window_end {
        rrule_set = rrule_set.before((window.end + Duration::seconds(1)).with_timezone(&tz));
    }

    let result = rrule_set.all(MAX_EXPANDED_OCCURRENCES);
    if result.limited {
        tracing::debug!(rrule, "Occurrence expansion hit the limit");
    }

    let occurrences = result
        .dates
        .into_iter()
        .map(|occurrence| occurrence.with_timezone(&event_tz))
        .filter(|occurrence| {
            if include_after_window_end {
                *occurrence >= window.start
            } else {
                window.contains(occurrence)
            }
        })
        .collect();

    Ok(occurrences)
}

/// The occurrence inside `window` closest to the window start.
///
/// `None` means the rule never fires inside the window.
pub fn next_occurrence(
    starting: &DateTime<Tz>,
    rrule: &str,
    window: &ReportWindow,
) -> CalReportResult<Option<DateTime<Tz>>> {
    let occurrences = expand(starting, rrule, window, false)?;

    // min_by_key keeps the first of equal distances, i.e. the earliest.
    let next = occurrences
        .into_iter()
        .min_by_key(|occurrence| (*occurrence - window.start).abs());

    match next {
        Some(next) => tracing::debug!(%next, rrule, "Generated next occurrence"),
        None => tracing::debug!(rrule, "Couldn't find any occurrence"),
    }

    Ok(next)
}

/// How often a bounded series still repeats after its first occurrence
/// in the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatTier {
    /// Exactly one more time
    Once,
    /// Two or three more times
    Few,
    /// More than three times
    Many,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repeats {
    /// Occurrences after the first one at or after the window start
    pub count: usize,
    /// Last occurrence of the series
    pub last: DateTime<Tz>,
    pub tier: RepeatTier,
}

/// Remaining repeats of a series bounded by UNTIL or COUNT.
///
/// Unbounded rules and series without any further repeat yield `None`.
pub fn remaining_repeats(
    series_start: &DateTime<Tz>,
    rrule: &str,
    window: &ReportWindow,
) -> CalReportResult<Option<Repeats>> {
    if !is_bounded(&rule_parts(rrule)) {
        return Ok(None);
    }

    let occurrences = expand(series_start, rrule, window, true)?;
    if occurrences.len() < 2 {
        return Ok(None);
    }

    let count = occurrences.len() - 1;
    let tier = match count {
        1 => RepeatTier::Once,
        2..=3 => RepeatTier::Few,
        _ => RepeatTier::Many,
    };
    let last = occurrences[count];

    Ok(Some(Repeats { count, last, tier }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freq {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// FREQ and INTERVAL of a rule, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub freq: Freq,
    pub interval: u32,
}

/// Read FREQ/INTERVAL from a rule. Other frequencies (HOURLY, ...) are not
/// described and yield `None`.
pub fn describe_frequency(rrule: &str) -> Option<Frequency> {
    let parts = rule_parts(rrule);
    let value = |name: &str| {
        parts
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.to_ascii_uppercase())
    };

    let freq = match value("FREQ")?.as_str() {
        "DAILY" => Freq::Daily,
        "WEEKLY" => Freq::Weekly,
        "MONTHLY" => Freq::Monthly,
        "YEARLY" => Freq::Yearly,
        _ => return None,
    };
    let interval = match value("INTERVAL") {
        Some(interval) => interval.parse().ok().filter(|i| *i > 0)?,
        None => 1,
    };

    Some(Frequency { freq, interval })
}
