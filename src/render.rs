//! Plain-text rendering of a report.

use calreport_core::grouping::{DayGroup, Report};
use calreport_core::{Event, TemplateSettings};
use calreport_core::recurrence::{Freq, RepeatTier, describe_frequency, remaining_repeats};
use calreport_core::window::ReportWindow;

const INDENT: &str = "           ";

/// Formats taken from the `[report]` settings, wording from `[templates]`.
pub struct RenderOptions<'a> {
    pub day_header: &'a str,
    pub starting_time: &'a str,
    pub window: &'a ReportWindow,
    pub templates: &'a TemplateSettings,
}

/// Replace each `{name}` in `template` with its value.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{}}}", name), value)
    })
}

/// Render single events first, then recurring ones, each under their
/// day headers. The recurring section is left out when empty.
pub fn render_report(report: &Report, options: &RenderOptions) -> String {
    let templates = options.templates;
    let start = options.window.start.format(options.day_header).to_string();
    let end = options.window.end.format(options.day_header).to_string();
    let mut out = fill(&templates.title, &[("start", start.as_str()), ("end", end.as_str())]);
    out.push('\n');

    let single = render_section(report.groups(), options, |e| !e.is_recurring());
    let recurring = render_section(report.groups(), options, Event::is_recurring);

    out.push('\n');
    if single.is_empty() {
        out.push_str(&templates.no_single_events);
        out.push('\n');
    } else {
        out.push_str(&single);
    }

    if !recurring.is_empty() {
        out.push('\n');
        out.push_str(&templates.recurring_header);
        out.push_str("\n\n");
        out.push_str(&recurring);
    }

    out
}

fn render_section(
    groups: &[DayGroup],
    options: &RenderOptions,
    include: impl Fn(&Event) -> bool,
) -> String {
    let mut out = String::new();

    for group in groups {
        let events: Vec<&Event> = group.events.iter().filter(|e| include(e)).collect();
        if events.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&group.key);
        out.push('\n');
        for event in events {
            out.push_str(&render_event(event, options));
        }
    }

    out
}

fn render_event(event: &Event, options: &RenderOptions) -> String {
    let time = match event.start() {
        Some(_) if event.is_fullday => options.templates.all_day.clone(),
        Some(start) => start.format(options.starting_time).to_string(),
        None => String::new(),
    };

    let mut line = format!("  {:>7}  {}", time, event);
    if let Some(rrule) = &event.rrule {
        line.push_str(&format!(" ({})", render_recurrence(event, rrule, options)));
    }
    line.push('\n');

    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        let location = fill(&options.templates.location, &[("location", location)]);
        line.push_str(&format!("{}{}\n", INDENT, location));
    }
    if let Some(more) = &event.more {
        for text in more.lines().filter(|l| !l.trim().is_empty()) {
            let text = fill(&options.templates.more, &[("text", text.trim())]);
            line.push_str(&format!("{}{}\n", INDENT, text));
        }
    }

    line
}

fn render_recurrence(event: &Event, rrule: &str, options: &RenderOptions) -> String {
    let Some(frequency) = describe_frequency(rrule) else {
        tracing::warn!(summary = %event, rrule, "Unsupported recurrence, showing the raw rule");
        return rrule.to_string();
    };

    let templates = options.templates;
    let mut text = frequency_text(templates, frequency.freq, frequency.interval);

    let Some(series_start) = &event.series_start else {
        return text;
    };
    match remaining_repeats(series_start, rrule, options.window) {
        Ok(Some(repeats)) => {
            let last = repeats
                .last
                .with_timezone(&options.window.timezone())
                .format(options.day_header)
                .to_string();
            let template = match repeats.tier {
                RepeatTier::Once => &templates.once_more,
                RepeatTier::Few => &templates.last_time,
                RepeatTier::Many => &templates.until,
            };
            text.push_str(", ");
            text.push_str(&fill(template, &[("date", last.as_str())]));
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(summary = %event, error = %e, "Could not count repeats"),
    }

    text
}

fn frequency_text(templates: &TemplateSettings, freq: Freq, interval: u32) -> String {
    let (every, every_n) = match freq {
        Freq::Daily => (&templates.every_day, &templates.every_n_days),
        Freq::Weekly => (&templates.every_week, &templates.every_n_weeks),
        Freq::Monthly => (&templates.every_month, &templates.every_n_months),
        Freq::Yearly => (&templates.every_year, &templates.every_n_years),
    };
    if interval == 1 {
        every.clone()
    } else {
        fill(every_n, &[("n", interval.to_string().as_str())])
    }
}
