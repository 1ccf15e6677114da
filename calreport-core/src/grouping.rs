//! Ordering kept events and grouping them per day.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::event::Event;

/// Events sharing one day key, in start order.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub key: String,
    pub events: Vec<Event>,
}

/// Day groups in the order their first event starts.
pub type DayGroups = Vec<DayGroup>;

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// Nothing to report; not an error
    NoEvents,
    Events(DayGroups),
}

impl Report {
    pub fn is_empty(&self) -> bool {
        matches!(self, Report::NoEvents)
    }

    pub fn groups(&self) -> &[DayGroup] {
        match self {
            Report::NoEvents => &[],
            Report::Events(groups) => groups,
        }
    }

    /// All events, in report order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.groups().iter().flat_map(|g| g.events.iter())
    }
}

/// Stable-sort `events` by start and group them by `day_key`.
///
/// Consecutive events with the same key form one group, so the key should
/// be monotonic in the start (a formatted local date is).
pub fn sort_and_group<F>(events: Vec<Event>, day_key: F) -> Report
where
    F: Fn(&DateTime<Tz>) -> String,
{
    let mut dated: Vec<(DateTime<Tz>, Event)> = Vec::with_capacity(events.len());
    for event in events {
        match event.starting {
            Some(starting) => dated.push((starting, event)),
            None => tracing::warn!(summary = %event, "Event without start reached grouping"),
        }
    }

    if dated.is_empty() {
        return Report::NoEvents;
    }

    dated.sort_by_key(|(starting, _)| *starting);

    let mut groups: DayGroups = Vec::new();
    for (starting, event) in dated {
        let key = day_key(&starting);
        match groups.last_mut() {
            Some(group) if group.key == key => group.events.push(event),
            _ => groups.push(DayGroup {
                key,
                events: vec![event],
            }),
        }
    }

    Report::Events(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    fn event(summary: &str, day: u32, hour: u32) -> Event {
        Event {
            starting: Some(Berlin.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()),
            summary: Some(summary.to_string()),
            location: None,
            is_fullday: false,
            more: None,
            status: None,
            rrule: None,
            series_start: None,
        }
    }

    fn by_date(dt: &DateTime<Tz>) -> String {
        dt.format("%Y-%m-%d").to_string()
    }

    fn summaries(group: &DayGroup) -> Vec<&str> {
        group.events.iter().filter_map(|e| e.summary.as_deref()).collect()
    }

    #[test]
    fn test_empty_input_is_no_events() {
        assert_eq!(sort_and_group(Vec::new(), by_date), Report::NoEvents);
        assert!(Report::NoEvents.is_empty());
    }

    #[test]
    fn test_events_are_sorted_and_grouped_by_day() {
        let events = vec![
            event("Dentist", 6, 9),
            event("Standup", 5, 10),
            event("Breakfast", 5, 8),
        ];

        let report = sort_and_group(events, by_date);

        let groups = report.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "2024-03-05");
        assert_eq!(summaries(&groups[0]), vec!["Breakfast", "Standup"]);
        assert_eq!(groups[1].key, "2024-03-06");
        assert_eq!(summaries(&groups[1]), vec!["Dentist"]);
    }

    #[test]
    fn test_equal_starts_keep_input_order() {
        let events = vec![event("First", 5, 10), event("Second", 5, 10), event("Third", 5, 10)];

        let report = sort_and_group(events, by_date);

        assert_eq!(summaries(&report.groups()[0]), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn test_event_without_start_is_dropped() {
        let unresolved = Event {
            starting: None,
            ..event("Unresolved", 5, 10)
        };

        let report = sort_and_group(vec![unresolved.clone()], by_date);
        assert_eq!(report, Report::NoEvents);

        let report = sort_and_group(vec![unresolved, event("Kept", 7, 12)], by_date);
        assert_eq!(report.events().count(), 1);
    }
}
