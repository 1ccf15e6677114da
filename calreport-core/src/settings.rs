//! Settings file and the frozen per-run settings.

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DAY_HEADER, DEFAULT_DAY_SPAN, DEFAULT_FAILURE_CEILING, DEFAULT_PASSWORD_ENV,
    DEFAULT_SEEN_STATUS, DEFAULT_STARTING_TIME, SKIPPED_STATUSES,
};
use crate::error::{CalReportError, CalReportResult};
use crate::window::ReportWindow;

/// Settings at ~/.config/calreport/config.toml
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SettingsFile {
    pub connection: ConnectionSettings,
    pub report: ReportSettings,
    pub seen: SeenSettings,
    pub log: LogSettings,
    pub templates: TemplateSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Base URL used to resolve relative hrefs; defaults to `calendar_url`
    pub server: Option<String>,
    pub calendar_url: Option<String>,
    pub user: Option<String>,
    /// Environment variable holding the password
    pub password_env: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ConnectionSettings {
            server: None,
            calendar_url: None,
            user: None,
            password_env: DEFAULT_PASSWORD_ENV.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ReportSettings {
    pub day_span: i64,
    /// IANA zone name; the system zone when unset
    pub timezone: Option<String>,
    /// strftime format of the day headers (also the grouping key)
    pub day_header: String,
    /// strftime format of event start times
    pub starting_time: String,
    pub output_file: Option<PathBuf>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            day_span: DEFAULT_DAY_SPAN,
            timezone: None,
            day_header: DEFAULT_DAY_HEADER.to_string(),
            starting_time: DEFAULT_STARTING_TIME.to_string(),
            output_file: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SeenSettings {
    pub status: String,
    pub failure_ceiling: u32,
    pub dry_run: bool,
}

impl Default for SeenSettings {
    fn default() -> Self {
        SeenSettings {
            status: DEFAULT_SEEN_STATUS.to_string(),
            failure_ceiling: DEFAULT_FAILURE_CEILING,
            dry_run: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Wording of the rendered report. `{name}` placeholders are filled in
/// when rendering; unknown placeholders are left as they are.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TemplateSettings {
    /// `{start}` and `{end}` are the window bounds in `report.day_header` format
    pub title: String,
    pub no_single_events: String,
    pub recurring_header: String,
    /// Shown instead of the start time of all-day events
    pub all_day: String,
    /// `{location}`
    pub location: String,
    /// One line of the description, `{text}`
    pub more: String,
    pub every_day: String,
    pub every_week: String,
    pub every_month: String,
    pub every_year: String,
    /// `{n}` is the INTERVAL of the rule
    pub every_n_days: String,
    pub every_n_weeks: String,
    pub every_n_months: String,
    pub every_n_years: String,
    /// Exactly one repeat left, `{date}` is the last occurrence
    pub once_more: String,
    /// Two or three repeats left
    pub last_time: String,
    /// More than three repeats left
    pub until: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        TemplateSettings {
            title: "Events from {start} to {end}".to_string(),
            no_single_events: "No single events.".to_string(),
            recurring_header: "Recurring events".to_string(),
            all_day: "all day".to_string(),
            location: "@ {location}".to_string(),
            more: "| {text}".to_string(),
            every_day: "every day".to_string(),
            every_week: "every week".to_string(),
            every_month: "every month".to_string(),
            every_year: "every year".to_string(),
            every_n_days: "every {n} days".to_string(),
            every_n_weeks: "every {n} weeks".to_string(),
            every_n_months: "every {n} months".to_string(),
            every_n_years: "every {n} years".to_string(),
            once_more: "once more on {date}".to_string(),
            last_time: "last time: {date}".to_string(),
            until: "until: {date}".to_string(),
        }
    }
}

impl SettingsFile {
    pub fn config_path() -> CalReportResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalReportError::Config("Could not determine config directory".into()))?
            .join("calreport");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the settings file (creating a commented default on first run),
    /// layered with `CALREPORT_<SECTION>__<KEY>` environment variables.
    pub fn load(path: Option<&Path>) -> CalReportResult<Self> {
        let config_path = match path {
            Some(path) => {
                let expanded = expand_path(path);
                if !expanded.exists() {
                    return Err(CalReportError::Config(format!(
                        "Settings file {} does not exist",
                        expanded.display()
                    )));
                }
                expanded
            }
            None => {
                let default_path = Self::config_path()?;
                if !default_path.exists() {
                    Self::create_default_config(&default_path)?;
                    tracing::info!(path = %default_path.display(), "Created default settings file");
                }
                default_path
            }
        };

        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> CalReportResult<Self> {
        Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(
                Environment::with_prefix("CALREPORT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CalReportError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalReportError::Config(e.to_string()))
    }

    /// Create a default settings file with the connection left to fill in.
    pub fn create_default_config(path: &Path) -> CalReportResult<()> {
        let contents = format!(
            "\
# calreport configuration

[connection]
# server = \"https://cloud.example.org/remote.php/dav/\"
# calendar_url = \"https://cloud.example.org/remote.php/dav/calendars/me/personal/\"
# user = \"me\"
# password_env = \"{password_env}\"

[report]
# day_span = {day_span}
# timezone = \"Europe/Berlin\"
# day_header = \"{day_header}\"
# starting_time = \"{starting_time}\"
# output_file = \"~/calreport.txt\"

[seen]
# Status written to recurring events once reported (TENTATIVE or CANCELLED):
# status = \"{status}\"
# failure_ceiling = {failure_ceiling}
# dry_run = false

[log]
# level = \"info\"
# file = \"~/.calreport.log\"

[templates]
# Wording of the report; {{name}} placeholders are filled in.
# title = \"Events from {{start}} to {{end}}\"
# no_single_events = \"No single events.\"
# recurring_header = \"Recurring events\"
# all_day = \"all day\"
# location = \"@ {{location}}\"
# more = \"| {{text}}\"
# every_day = \"every day\"
# every_week = \"every week\"
# every_month = \"every month\"
# every_year = \"every year\"
# every_n_days = \"every {{n}} days\"
# every_n_weeks = \"every {{n}} weeks\"
# every_n_months = \"every {{n}} months\"
# every_n_years = \"every {{n}} years\"
# once_more = \"once more on {{date}}\"
# last_time = \"last time: {{date}}\"
# until = \"until: {{date}}\"
",
            password_env = DEFAULT_PASSWORD_ENV,
            day_span = DEFAULT_DAY_SPAN,
            day_header = DEFAULT_DAY_HEADER,
            starting_time = DEFAULT_STARTING_TIME,
            status = DEFAULT_SEEN_STATUS,
            failure_ceiling = DEFAULT_FAILURE_CEILING,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalReportError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalReportError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn output_file(&self) -> Option<PathBuf> {
        self.report.output_file.as_deref().map(expand_path)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.log.file.as_deref().map(expand_path)
    }

    /// Validate everything a run depends on and freeze it.
    ///
    /// All problems are reported together in one `Config` error.
    pub fn run_settings(
        &self,
        from: &str,
        to: Option<&str>,
        dry_run: bool,
    ) -> CalReportResult<RunSettings> {
        let mut problems = Vec::new();

        if self.connection.calendar_url.is_none() {
            problems.push("connection.calendar_url is not set".to_string());
        }
        if self.connection.user.is_none() {
            problems.push("connection.user is not set".to_string());
        }

        let seen_status = self.seen.status.trim().to_ascii_uppercase();
        if !SKIPPED_STATUSES.contains(&seen_status.as_str()) {
            problems.push(format!(
                "seen.status is \"{}\", expected TENTATIVE or CANCELLED",
                self.seen.status
            ));
        }

        if self.seen.failure_ceiling < 1 {
            problems.push("seen.failure_ceiling must be at least 1".to_string());
        }

        for (key, format) in [
            ("report.day_header", &self.report.day_header),
            ("report.starting_time", &self.report.starting_time),
        ] {
            if !is_valid_format(format) {
                problems.push(format!("{} \"{}\" is not a valid date format", key, format));
            }
        }

        if self.report.day_span < 0 {
            problems.push(format!("report.day_span is {}, must not be negative", self.report.day_span));
        }

        let timezone = match resolve_timezone(self.report.timezone.as_deref()) {
            Ok(tz) => Some(tz),
            Err(e) => {
                problems.push(e.to_string());
                None
            }
        };

        let window = timezone.and_then(|tz| {
            match ReportWindow::from_args(from, to, self.report.day_span, tz) {
                Ok(window) => Some(window),
                Err(e) => {
                    problems.push(e.to_string());
                    None
                }
            }
        });

        match (window, timezone) {
            (Some(window), Some(timezone)) if problems.is_empty() => Ok(RunSettings {
                window,
                timezone,
                dry_run: dry_run || self.seen.dry_run,
                seen_status,
                failure_ceiling: self.seen.failure_ceiling,
            }),
            _ => Err(CalReportError::Config(problems.join("; "))),
        }
    }
}

/// The configured zone, or the system zone when none is configured.
pub fn resolve_timezone(configured: Option<&str>) -> CalReportResult<Tz> {
    match configured {
        Some(name) => name
            .trim()
            .parse::<Tz>()
            .map_err(|_| CalReportError::Config(format!("report.timezone \"{}\" is unknown", name))),
        None => match iana_time_zone::get_timezone() {
            Ok(name) => name.parse::<Tz>().map_err(|_| {
                CalReportError::Config(format!(
                    "System timezone \"{}\" is unknown, set report.timezone",
                    name
                ))
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Could not detect system timezone, using UTC");
                Ok(Tz::UTC)
            }
        },
    }
}

/// Formatting with an invalid strftime string panics in chrono.
fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Settings of one run, frozen after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub window: ReportWindow,
    pub timezone: Tz,
    pub dry_run: bool,
    /// Status token written to reported recurring events
    pub seen_status: String,
    pub failure_ceiling: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use chrono_tz::Europe::Berlin;

    fn valid() -> SettingsFile {
        let mut settings = SettingsFile::default();
        settings.connection.calendar_url = Some("https://dav.example.org/cal/me/work/".to_string());
        settings.connection.user = Some("me".to_string());
        settings.report.timezone = Some("Europe/Berlin".to_string());
        settings
    }

    fn config_message(result: CalReportResult<RunSettings>) -> String {
        match result {
            Err(CalReportError::Config(message)) => message,
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let settings = SettingsFile::default();

        assert_eq!(settings.report.day_span, 14);
        assert_eq!(settings.seen.status, "TENTATIVE");
        assert_eq!(settings.seen.failure_ceiling, 2);
        assert_eq!(settings.connection.password_env, "CALREPORT_PASSWORD");
        assert!(!settings.seen.dry_run);
    }

    #[test]
    fn test_default_config_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calreport").join("config.toml");

        SettingsFile::create_default_config(&path).unwrap();
        let settings = SettingsFile::load_from(&path).unwrap();

        assert!(std::fs::read_to_string(&path).unwrap().contains("[seen]"));
        assert_eq!(settings.seen.status, "TENTATIVE");
        assert_eq!(settings.report.day_header, "%a, %d.%m");
        assert_eq!(settings.connection.calendar_url, None);
        assert_eq!(settings.templates, TemplateSettings::default());
    }

    #[test]
    fn test_templates_override_single_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[templates]
all_day = "den ganzen Tag lang"
every_n_weeks = "jede {n}. Woche"
"#,
        )
        .unwrap();

        let settings = SettingsFile::load(Some(&path)).unwrap();

        assert_eq!(settings.templates.all_day, "den ganzen Tag lang");
        assert_eq!(settings.templates.every_n_weeks, "jede {n}. Woche");
        assert_eq!(settings.templates.title, "Events from {start} to {end}");
    }

    #[test]
    fn test_load_reads_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[connection]
calendar_url = "https://dav.example.org/cal/me/work/"
user = "me"

[report]
day_span = 7
timezone = "America/New_York"

[seen]
status = "CANCELLED"
failure_ceiling = 5
dry_run = true
"#,
        )
        .unwrap();

        let settings = SettingsFile::load(Some(&path)).unwrap();

        assert_eq!(settings.connection.user.as_deref(), Some("me"));
        assert_eq!(settings.report.day_span, 7);
        assert_eq!(settings.report.starting_time, "%H:%M");
        assert_eq!(settings.seen.status, "CANCELLED");
        assert_eq!(settings.seen.failure_ceiling, 5);
        assert!(settings.seen.dry_run);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");

        assert!(matches!(
            SettingsFile::load(Some(&path)),
            Err(CalReportError::Config(_))
        ));
    }

    #[test]
    fn test_run_settings_are_frozen_from_file_and_flags() {
        let run = valid().run_settings("2024-03-04", None, true).unwrap();

        assert_eq!(run.timezone, Berlin);
        assert_eq!(run.window.start, Berlin.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
        assert_eq!(run.window.end, Berlin.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap());
        assert!(run.dry_run);
        assert_eq!(run.seen_status, "TENTATIVE");
        assert_eq!(run.failure_ceiling, 2);
    }

    #[test]
    fn test_explicit_end_date_covers_the_whole_day() {
        let run = valid().run_settings("2024-03-04", Some("2024-03-05"), false).unwrap();

        assert_eq!(run.window.end.hour(), 23);
        assert!(!run.dry_run);
    }

    #[test]
    fn test_seen_status_must_be_skipped_by_filter() {
        let mut settings = valid();
        settings.seen.status = "CONFIRMED".to_string();

        let message = config_message(settings.run_settings("2024-03-04", None, false));

        assert!(message.contains("seen.status"));
    }

    #[test]
    fn test_all_problems_reported_together() {
        let mut settings = SettingsFile::default();
        settings.seen.failure_ceiling = 0;
        settings.report.timezone = Some("Mars/Olympus".to_string());

        let message = config_message(settings.run_settings("2024-03-04", None, false));

        assert!(message.contains("calendar_url"));
        assert!(message.contains("connection.user"));
        assert!(message.contains("failure_ceiling"));
        assert!(message.contains("Mars/Olympus"));
    }

    #[test]
    fn test_invalid_date_format_is_rejected() {
        let mut settings = valid();
        settings.report.starting_time = "%H:%Q".to_string();

        let message = config_message(settings.run_settings("2024-03-04", None, false));

        assert!(message.contains("report.starting_time"));
        assert!(!message.contains("report.day_header"));
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let message = config_message(valid().run_settings("2024-03-04", Some("2024-03-01"), false));

        assert!(message.contains("earlier than start"));
    }

    #[test]
    fn test_out_of_range_day_span_is_rejected() {
        let mut settings = valid();
        settings.report.day_span = 200_000_000;

        let message = config_message(settings.run_settings("2024-03-04", None, false));

        assert!(message.contains("report.day_span"));
    }

    #[test]
    fn test_malformed_date_is_rejected() {
        let message = config_message(valid().run_settings("04.03.2024", None, false));

        assert!(!message.is_empty());
    }
}
