use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::catalog;
use crate::limits::SLOT_MINUTES;
use crate::model::{AppointmentStatus, ProviderState, Span};

use super::EngineError;

/// The shop clock: naive local time, the one time representation used
/// everywhere (no timezone handling anywhere in the engine).
pub(crate) fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Starts must sit on the 15-minute grid; only the minute component matters.
pub(crate) fn check_alignment(t: NaiveTime) -> Result<(), EngineError> {
    if t.minute() % SLOT_MINUTES != 0 {
        return Err(EngineError::InvalidAlignment);
    }
    Ok(())
}

/// Block intervals for this provider on `date`.
pub(crate) fn block_spans_on(state: &ProviderState, date: NaiveDate) -> Vec<Span> {
    state.blocks_on(date).map(|b| b.span).collect()
}

/// Intervals of booked appointments for this provider on `date`, resolved
/// through the service catalog. Rows whose key no longer resolves are
/// skipped: a deliberate tolerance for legacy ledger data, not an error.
pub(crate) fn booked_spans_on(state: &ProviderState, date: NaiveDate) -> Vec<Span> {
    state
        .appointments_on(date)
        .filter(|a| a.status == AppointmentStatus::Booked)
        .filter_map(|a| match catalog::duration(&a.service) {
            Some(duration) => Some(Span::new(a.starts_at, a.starts_at + duration)),
            None => {
                tracing::debug!(
                    appointment = %a.id,
                    service = %a.service,
                    "skipping appointment with unknown service key"
                );
                None
            }
        })
        .collect()
}

/// Conflict scan for a candidate interval: blocks first, then booked
/// appointments, matching the booking pipeline's error precedence.
pub(crate) fn check_no_conflict(state: &ProviderState, span: &Span) -> Result<(), EngineError> {
    let date = span.start.date();
    for block in state.blocks_on(date) {
        if block.span.overlaps(span) {
            return Err(EngineError::BlockConflict);
        }
    }
    for existing in booked_spans_on(state, date) {
        if existing.overlaps(span) {
            return Err(EngineError::DoubleBooked);
        }
    }
    Ok(())
}
