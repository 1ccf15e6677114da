//! Error types for calreport.

use thiserror::Error;

/// Errors that can occur while building a report.
#[derive(Error, Debug)]
pub enum CalReportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid report window: end ({end}) is earlier than start ({start})")]
    InvalidWindow { start: String, end: String },

    #[error("Not authorized by the calendar server: {0}")]
    Unauthorized(String),

    #[error("Calendar or server not found: {0}")]
    NotFound(String),

    #[error("Calendar server returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Recurrence rule error: {0}")]
    Recurrence(String),

    #[error("Marking events as seen failed {failures} time(s), ceiling is {ceiling}")]
    FailureCeiling { failures: u32, ceiling: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalReportError {
    /// Whether this error must end the run.
    ///
    /// Recurrence and parse errors only ever drop a single event.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CalReportError::IcsParse(_) | CalReportError::Recurrence(_))
    }
}

/// Result type alias for calreport operations.
pub type CalReportResult<T> = Result<T, CalReportError>;
