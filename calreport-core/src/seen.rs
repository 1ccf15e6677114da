//! Marking reported events as seen on the server.
//!
//! An event counts as seen once its STATUS carries the configured token
//! (TENTATIVE by default). The filter skips such events, so each event is
//! reported once. A failed write is rolled back by deleting the record and
//! recreating it from the data captured before the edit.

use tracing::{debug, error, info, warn};

use crate::error::{CalReportError, CalReportResult};
use crate::event::Event;
use crate::remote::{CalendarHandle, CalendarTransport, RemoteRecord};

/// Failed markings within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounter {
    failures: u32,
    ceiling: u32,
}

impl FailureCounter {
    pub fn new(ceiling: u32) -> Self {
        FailureCounter { failures: 0, ceiling }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Count one failure. Errors once the ceiling is reached.
    pub fn record_failure(&mut self) -> CalReportResult<()> {
        self.failures += 1;
        if self.failures >= self.ceiling {
            return Err(CalReportError::FailureCeiling {
                failures: self.failures,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }
}

/// Everything needed to mark one event and undo it.
#[derive(Debug)]
pub struct MutationContext<'a> {
    pub event: &'a Event,
    pub record: RemoteRecord,
    pub calendar: &'a CalendarHandle,
    /// Serialized record from before any edit
    pub original: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    DryRun,
    /// The write failed and the record was restored (or that was attempted).
    RolledBack { rollback_complete: bool },
}

impl MarkOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, MarkOutcome::RolledBack { .. })
    }
}

/// Set the seen token on the event's record and write it back.
///
/// A failed write is rolled back and counted; an `Err` is only returned
/// once `counter` reaches its ceiling, and the run has to stop then.
pub fn mark_seen<T: CalendarTransport + ?Sized>(
    transport: &T,
    ctx: MutationContext<'_>,
    seen_status: &str,
    dry_run: bool,
    counter: &mut FailureCounter,
) -> CalReportResult<MarkOutcome> {
    let MutationContext {
        event,
        mut record,
        calendar,
        original,
    } = ctx;

    if dry_run {
        warn!(
            summary = %event,
            "Dry run: not marking as seen, the event will be reported again"
        );
        return Ok(MarkOutcome::DryRun);
    }

    match write_status(transport, &mut record, seen_status) {
        Ok(()) => {
            info!(summary = %event, status = seen_status, "Marked as seen");
            Ok(MarkOutcome::Marked)
        }
        Err(e) => {
            warn!(
                summary = %event,
                error = %e,
                "Marking as seen failed, the event may have changed on the server"
            );
            let rollback_complete = roll_back(transport, &record, calendar, &original);

            if let Err(e) = counter.record_failure() {
                error!(
                    failures = counter.failures(),
                    ceiling = counter.ceiling(),
                    "Too many failed attempts to mark events as seen"
                );
                return Err(e);
            }
            Ok(MarkOutcome::RolledBack { rollback_complete })
        }
    }
}

fn write_status<T: CalendarTransport + ?Sized>(
    transport: &T,
    record: &mut RemoteRecord,
    seen_status: &str,
) -> CalReportResult<()> {
    transport.set_status_field(record, seen_status)?;
    transport.persist(record)
}

fn roll_back<T: CalendarTransport + ?Sized>(
    transport: &T,
    record: &RemoteRecord,
    calendar: &CalendarHandle,
    original: &str,
) -> bool {
    info!(href = %record.href, "Rolling back");
    debug!(data = original, "Restoring record");

    let result = transport
        .delete(record)
        .and_then(|()| transport.recreate(calendar, original));

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(href = %record.href, error = %e, "Rollback may have failed");
            false
        }
    }
}
