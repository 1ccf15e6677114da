//! tracing-subscriber setup.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log level from the command line flags, else the configured one.
pub fn level<'a>(quiet: bool, debug: bool, configured: &'a str) -> &'a str {
    if quiet {
        "warn"
    } else if debug {
        "debug"
    } else {
        configured
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`; `file`
/// is appended to, stdout is used without one.
pub fn init(level: &str, file: Option<&Path>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level \"{}\", check log.level", level))?,
    };

    let file_layer = match file {
        Some(path) => {
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Could not open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        }
        None => None,
    };
    let stdout_layer = file.is_none().then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(())
}
