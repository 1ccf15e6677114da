//! STATUS editing on raw calendar data.

use icalendar::parser::unfold;

use crate::error::{CalReportError, CalReportResult};

/// Set STATUS of the record's main VEVENT to `token`, adding the property
/// if it is missing. Everything else is left as it was (unfolded).
pub fn set_status(content: &str, token: &str) -> CalReportResult<String> {
    let unfolded = unfold(content);
    let mut lines: Vec<String> = unfolded
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .filter(|line| !line.is_empty())
        .collect();

    let (begin, end) = main_vevent_span(&lines)
        .ok_or_else(|| CalReportError::IcsParse("No VEVENT in calendar data".to_string()))?;

    let status_line = format!("STATUS:{}", token);
    let own_lines = own_property_lines(&lines, begin, end);
    let existing: Vec<usize> = own_lines
        .into_iter()
        .filter(|&i| property_name(&lines[i]) == "STATUS")
        .collect();

    match existing.split_first() {
        Some((&first, rest)) => {
            lines[first] = status_line;
            for &i in rest.iter().rev() {
                lines.remove(i);
            }
        }
        None => lines.insert(end, status_line),
    }

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    Ok(out)
}

fn property_name(line: &str) -> String {
    line.split([':', ';'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase()
}

/// Line indexes of the `BEGIN:VEVENT` and matching `END:VEVENT` of the
/// first VEVENT without RECURRENCE-ID (falling back to the first VEVENT).
fn main_vevent_span(lines: &[String]) -> Option<(usize, usize)> {
    let mut spans = Vec::new();
    let mut begin = None;
    let mut depth = 0usize;

    for (i, line) in lines.iter().enumerate() {
        let upper = line.trim().to_ascii_uppercase();
        if upper.starts_with("BEGIN:") {
            if upper == "BEGIN:VEVENT" && begin.is_none() {
                begin = Some(i);
                depth = 0;
            }
            if begin.is_some() {
                depth += 1;
            }
        } else if upper.starts_with("END:") && begin.is_some() {
            depth -= 1;
            if depth == 0 {
                if let Some(start) = begin.take() {
                    spans.push((start, i));
                }
            }
        }
    }

    spans
        .iter()
        .copied()
        .find(|&(b, e)| {
            own_property_lines(lines, b, e)
                .into_iter()
                .all(|i| property_name(&lines[i]) != "RECURRENCE-ID")
        })
        .or_else(|| spans.first().copied())
}

/// Property lines directly inside the component spanning `begin..end`,
/// skipping nested components such as VALARM.
fn own_property_lines(lines: &[String], begin: usize, end: usize) -> Vec<usize> {
    let mut nested = 0usize;
    let mut own = Vec::new();

    for i in (begin + 1)..end {
        let upper = lines[i].trim().to_ascii_uppercase();
        if upper.starts_with("BEGIN:") {
            nested += 1;
        } else if upper.starts_with("END:") {
            nested = nested.saturating_sub(1);
        } else if nested == 0 {
            own.push(i);
        }
    }

    own
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_STATUS: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:abc\r\n\
STATUS:CONFIRMED\r\n\
DTSTART:20240110T150000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_replaces_existing_status() {
        let edited = set_status(WITH_STATUS, "TENTATIVE").unwrap();

        assert!(edited.contains("STATUS:TENTATIVE\r\n"));
        assert!(!edited.contains("CONFIRMED"));
        assert!(edited.contains("UID:abc"));
        assert!(edited.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_adds_missing_status_before_end_of_vevent() {
        let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:abc\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
STATUS:IGNORED-IN-ALARM\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let edited = set_status(ics, "CANCELLED").unwrap();
        let lines: Vec<&str> = edited.lines().map(|l| l.trim_end_matches('\r')).collect();

        let status = lines.iter().position(|l| *l == "STATUS:CANCELLED").unwrap();
        assert_eq!(lines[status + 1], "END:VEVENT");
        assert!(lines.contains(&"STATUS:IGNORED-IN-ALARM"));
    }

    #[test]
    fn test_edits_series_master_not_override() {
        let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:abc\r\n\
RECURRENCE-ID:20240117T150000Z\r\n\
STATUS:CONFIRMED\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:abc\r\n\
RRULE:FREQ=WEEKLY\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let edited = set_status(ics, "TENTATIVE").unwrap();

        assert!(edited.contains("STATUS:CONFIRMED"));
        assert!(edited.contains("RRULE:FREQ=WEEKLY\r\nSTATUS:TENTATIVE\r\nEND:VEVENT"));
    }

    #[test]
    fn test_folded_status_is_replaced_whole() {
        let ics = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:abc\r\nSTATUS:CONF\r\n IRMED\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

        let edited = set_status(ics, "TENTATIVE").unwrap();

        assert!(!edited.contains("IRMED"));
        assert!(edited.contains("STATUS:TENTATIVE"));
    }

    #[test]
    fn test_no_vevent_is_an_error() {
        let ics = "BEGIN:VCALENDAR\r\nEND:VCALENDAR\r\n";

        assert!(matches!(set_status(ics, "TENTATIVE"), Err(CalReportError::IcsParse(_))));
    }
}
