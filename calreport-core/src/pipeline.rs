//! One report run: query, normalize, filter, mark as seen, group.

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::error::CalReportResult;
use crate::filter::skip_reason;
use crate::grouping::{Report, sort_and_group};
use crate::ics;
use crate::normalize::normalize;
use crate::remote::{CalendarHandle, CalendarTransport};
use crate::seen::{FailureCounter, MutationContext, mark_seen};
use crate::settings::RunSettings;

/// Collect the events of `calendar` that belong in the report.
///
/// Records are handled one at a time in the order the server returned
/// them. Kept recurring events are marked as seen before the next record
/// is looked at. Query and load failures end the run, as does reaching
/// the failure ceiling while marking.
pub fn collect_events<T, F>(
    transport: &T,
    calendar: &CalendarHandle,
    settings: &RunSettings,
    day_key: F,
) -> CalReportResult<Report>
where
    T: CalendarTransport + ?Sized,
    F: Fn(&DateTime<Tz>) -> String,
{
    let window = &settings.window;
    let records = transport.query(window)?;
    info!(count = records.len(), "Received calendar records");

    let mut counter = FailureCounter::new(settings.failure_ceiling);
    let mut kept = Vec::new();

    for mut record in records {
        transport.load(&mut record)?;
        let original = transport.serialize(&record)?;

        let raw = match ics::parse_record(&original, settings.timezone) {
            Ok(raw) => raw,
            Err(e) if !e.is_fatal() => {
                warn!(href = %record.href, error = %e, "Skipping unreadable record");
                continue;
            }
            Err(e) => return Err(e),
        };

        let event = normalize(raw, window, settings.timezone);
        if let Some(reason) = skip_reason(&event, window) {
            info!(summary = %event, %reason, "Skipping event");
            continue;
        }
        debug!(summary = %event, "Keeping event");

        if event.is_recurring() {
            let ctx = MutationContext {
                event: &event,
                record,
                calendar,
                original,
            };
            mark_seen(
                transport,
                ctx,
                &settings.seen_status,
                settings.dry_run,
                &mut counter,
            )?;
        }

        kept.push(event);
    }

    if counter.failures() > 0 {
        warn!(
            failures = counter.failures(),
            ceiling = counter.ceiling(),
            "Some events could not be marked as seen"
        );
    }

    Ok(sort_and_group(kept, day_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CalReportError;
    use crate::memory::{Call, MemoryCalendar};
    use crate::window::ReportWindow;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    const WEEKLY: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:yoga\r\n\
DTSTART;TZID=Europe/Berlin:20240304T190000\r\n\
RRULE:FREQ=WEEKLY;COUNT=3\r\n\
SUMMARY:Yoga\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    const CANCELLED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:dinner\r\n\
DTSTART;TZID=Europe/Berlin:20240305T200000\r\n\
SUMMARY:Dinner\r\n\
STATUS:CANCELLED\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    const SINGLE: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:dentist\r\n\
DTSTART:20240306T080000Z\r\n\
SUMMARY:Dentist\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    const DAILY: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:standup\r\n\
DTSTART;TZID=Europe/Berlin:20240301T093000\r\n\
RRULE:FREQ=DAILY\r\n\
SUMMARY:Standup\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn settings(dry_run: bool) -> RunSettings {
        RunSettings {
            window: ReportWindow::new(
                Berlin.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap(),
                Berlin.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap(),
            )
            .unwrap(),
            timezone: Berlin,
            dry_run,
            seen_status: "TENTATIVE".to_string(),
            failure_ceiling: 2,
        }
    }

    fn by_date(dt: &DateTime<Tz>) -> String {
        dt.format("%Y-%m-%d").to_string()
    }

    fn calendar() -> CalendarHandle {
        CalendarHandle::new("/cal")
    }

    #[test]
    fn test_weekly_event_kept_and_cancelled_event_dropped() {
        let server = MemoryCalendar::with_events(&[("/cal/yoga.ics", WEEKLY), ("/cal/dinner.ics", CANCELLED)]);

        let report = collect_events(&server, &calendar(), &settings(false), by_date).unwrap();

        let groups = report.groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "2024-03-04");
        assert_eq!(groups[0].events.len(), 1);
        let yoga = &groups[0].events[0];
        assert_eq!(yoga.summary.as_deref(), Some("Yoga"));
        assert_eq!(yoga.starting, Some(Berlin.with_ymd_and_hms(2024, 3, 4, 19, 0, 0).unwrap()));

        // the recurring event is now marked, the cancelled one untouched
        assert!(server.data("/cal/yoga.ics").unwrap().contains("STATUS:TENTATIVE"));
        assert_eq!(server.data("/cal/dinner.ics").as_deref(), Some(CANCELLED));
    }

    #[test]
    fn test_marked_event_is_skipped_on_the_next_run() {
        let server = MemoryCalendar::with_events(&[("/cal/yoga.ics", WEEKLY)]);

        let first = collect_events(&server, &calendar(), &settings(false), by_date).unwrap();
        let second = collect_events(&server, &calendar(), &settings(false), by_date).unwrap();

        assert_eq!(first.events().count(), 1);
        assert_eq!(second, Report::NoEvents);
    }

    #[test]
    fn test_dry_run_only_queries() {
        let server = MemoryCalendar::with_events(&[("/cal/yoga.ics", WEEKLY), ("/cal/dentist.ics", SINGLE)]);

        let report = collect_events(&server, &calendar(), &settings(true), by_date).unwrap();

        assert_eq!(report.events().count(), 2);
        assert_eq!(
            server.calls(),
            vec![
                Call::Query,
                Call::Load("/cal/yoga.ics".to_string()),
                Call::Load("/cal/dentist.ics".to_string()),
            ]
        );
        assert_eq!(server.data("/cal/yoga.ics").as_deref(), Some(WEEKLY));
    }

    #[test]
    fn test_single_events_are_never_marked() {
        let server = MemoryCalendar::with_events(&[("/cal/dentist.ics", SINGLE)]);

        let report = collect_events(&server, &calendar(), &settings(false), by_date).unwrap();

        assert_eq!(report.groups()[0].key, "2024-03-06");
        assert!(!server.calls().iter().any(|c| matches!(c, Call::Persist(_))));
    }

    #[test]
    fn test_records_are_loaded_when_query_returns_hrefs_only() {
        let mut server = MemoryCalendar::with_events(&[("/cal/dentist.ics", SINGLE)]);
        server.lazy = true;

        let report = collect_events(&server, &calendar(), &settings(true), by_date).unwrap();

        assert_eq!(report.events().count(), 1);
    }

    #[test_log::test]
    fn test_unreadable_record_is_skipped() {
        let server = MemoryCalendar::with_events(&[
            ("/cal/todo.ics", "BEGIN:VCALENDAR\r\nBEGIN:VTODO\r\nUID:x\r\nEND:VTODO\r\nEND:VCALENDAR\r\n"),
            ("/cal/dentist.ics", SINGLE),
        ]);

        let report = collect_events(&server, &calendar(), &settings(false), by_date).unwrap();

        assert_eq!(report.events().count(), 1);
    }

    #[test]
    fn test_query_failure_ends_the_run() {
        let server = MemoryCalendar::default();
        *server.query_error.borrow_mut() = Some(CalReportError::Unauthorized("401".to_string()));

        let result = collect_events(&server, &calendar(), &settings(false), by_date);

        assert!(matches!(result, Err(CalReportError::Unauthorized(_))));
    }

    #[test]
    fn test_failure_ceiling_ends_the_run() {
        let server = MemoryCalendar::with_events(&[
            ("/cal/yoga.ics", WEEKLY),
            ("/cal/standup.ics", DAILY),
            ("/cal/dentist.ics", SINGLE),
        ]);
        server.persist_failures.set(2);

        let result = collect_events(&server, &calendar(), &settings(false), by_date);

        assert!(matches!(
            result,
            Err(CalReportError::FailureCeiling { failures: 2, ceiling: 2 })
        ));
        // the run stopped before the third record
        assert!(!server.calls().contains(&Call::Load("/cal/dentist.ics".to_string())));
    }

    #[test]
    fn test_failure_counter_starts_fresh_each_run() {
        let server = MemoryCalendar::with_events(&[("/cal/yoga.ics", WEEKLY)]);
        server.persist_failures.set(1);

        let first = collect_events(&server, &calendar(), &settings(false), by_date).unwrap();
        // rolled back, so still unmarked; this failure must not add up
        server.persist_failures.set(1);
        let second = collect_events(&server, &calendar(), &settings(false), by_date).unwrap();

        assert_eq!(first.events().count(), 1);
        assert_eq!(second.events().count(), 1);
        assert_eq!(server.data("/cal/yoga.ics").as_deref(), Some(WEEKLY));
    }
}
