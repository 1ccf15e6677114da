mod logging;
mod password;
mod render;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use calreport_caldav::{CalDavClient, Credentials};
use calreport_core::{CalReportError, SettingsFile, collect_events};
use chrono::DateTime;
use chrono_tz::Tz;
use clap::Parser;
use owo_colors::OwoColorize;

use render::{RenderOptions, render_report};

#[derive(Parser)]
#[command(name = "calreport", version)]
#[command(about = "Report the events of a CalDAV calendar and mark reported recurring events as seen")]
struct Cli {
    /// First day of the report (YYYY-MM-DD)
    from: String,

    /// Last day of the report (YYYY-MM-DD), defaults to FROM + report.day_span
    #[arg(short, long)]
    to: Option<String>,

    /// Don't mark recurring events as seen (they will be reported again)
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Append log messages to this file
    #[arg(short, long, conflicts_with = "log_stdout")]
    log_file: Option<PathBuf>,

    /// Log to stdout even if log.file is set
    #[arg(short = 's', long)]
    log_stdout: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "debug")]
    quiet: bool,

    /// Log debug messages
    #[arg(short, long)]
    debug: bool,

    /// Settings file (defaults to ~/.config/calreport/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => SettingsFile::config_path()?,
    };
    let first_run = cli.config.is_none() && !settings_path.exists();

    let settings = SettingsFile::load(cli.config.as_deref())
        .with_context(|| format!("Could not load settings from {}", settings_path.display()))?;

    if first_run {
        println!(
            "Created {}, fill in the [connection] section and run again.",
            settings_path.display()
        );
    }

    let log_file = match (&cli.log_file, cli.log_stdout) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => None,
        (None, false) => settings.log_file(),
    };
    logging::init(
        logging::level(cli.quiet, cli.debug, &settings.log.level),
        log_file.as_deref(),
    )?;

    let run = settings
        .run_settings(&cli.from, cli.to.as_deref(), cli.dry_run)
        .with_context(|| format!("Invalid settings, check {}", settings_path.display()))?;
    tracing::debug!(?run, "Settings frozen");

    // run_settings has checked both are present
    let connection = &settings.connection;
    let (Some(calendar_url), Some(user)) = (&connection.calendar_url, &connection.user) else {
        anyhow::bail!("connection.calendar_url and connection.user must be set");
    };

    let password = password::lookup(&connection.password_env, user)?;
    let client = CalDavClient::new(
        connection.server.as_deref(),
        calendar_url,
        Credentials::new(user.as_str(), password),
    )
    .with_context(|| format!("Invalid connection settings in {}", settings_path.display()))?;
    let calendar = client.calendar();

    let day_header = settings.report.day_header.as_str();
    let day_key = |dt: &DateTime<Tz>| dt.format(day_header).to_string();

    let report = collect_events(&client, &calendar, &run, day_key)
        .map_err(|e| explain(e, &settings_path))?;

    if report.is_empty() {
        tracing::info!("No events in the report window");
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    let text = render_report(
        &report,
        &RenderOptions {
            day_header,
            starting_time: &settings.report.starting_time,
            window: &run.window,
            templates: &settings.templates,
        },
    );

    match cli.output.or_else(|| settings.output_file()) {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("Could not write report to {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", text),
    }

    Ok(())
}

/// Attach the settings to check to a fatal core error.
fn explain(error: CalReportError, settings_path: &Path) -> anyhow::Error {
    let path = settings_path.display();
    let hint = match &error {
        CalReportError::Unauthorized(_) => format!(
            "Connection failed: wrong password? Check connection.user, connection.server and connection.calendar_url in {}",
            path
        ),
        CalReportError::NotFound(_) => format!(
            "Calendar not found, check connection.calendar_url and connection.server in {}",
            path
        ),
        CalReportError::FailureCeiling { .. } => format!(
            "Marking events as seen failed too often. Raise seen.failure_ceiling in {} or run with --dry-run",
            path
        ),
        CalReportError::Transport(_) | CalReportError::Http { .. } => format!(
            "Talking to the calendar server failed, check connection.server in {}",
            path
        ),
        _ => "Building the report failed".to_string(),
    };
    anyhow::Error::new(error).context(hint)
}
