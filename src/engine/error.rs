#[derive(Debug)]
pub enum EngineError {
    /// Weekly schedule failed field validation; payload names the rule broken.
    InvalidSchedule(&'static str),
    /// Provider must set a weekly schedule before this operation.
    ScheduleRequired,
    /// The path-specified provider has no schedule on record.
    ProviderNotFound,
    NotWorkingDay,
    /// Start time is off the 15-minute grid.
    InvalidAlignment,
    OutOfWorkingHours,
    /// Requested interval overlaps a lunch break or day off.
    BlockConflict,
    /// Requested interval overlaps a booked appointment, or its exact start
    /// instant is already taken.
    DoubleBooked,
    UnknownService(String),
    PastBooking,
    NotFound,
    AlreadyCanceled,
    Forbidden,
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            EngineError::InvalidSchedule(_) => "invalid_schedule",
            EngineError::ScheduleRequired => "schedule_required",
            EngineError::ProviderNotFound => "provider_not_found",
            EngineError::NotWorkingDay => "not_working_day",
            EngineError::InvalidAlignment => "invalid_alignment",
            EngineError::OutOfWorkingHours => "out_of_working_hours",
            EngineError::BlockConflict => "block_conflict",
            EngineError::DoubleBooked => "double_booked",
            EngineError::UnknownService(_) => "unknown_service",
            EngineError::PastBooking => "past_booking",
            EngineError::NotFound => "not_found",
            EngineError::AlreadyCanceled => "already_canceled",
            EngineError::Forbidden => "forbidden",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "wal_error",
        }
    }

    /// Stable status code per kind, matching the observable contract of the
    /// HTTP surface embedders put in front of the engine.
    pub fn status(&self) -> u16 {
        match self {
            EngineError::ProviderNotFound | EngineError::NotFound => 404,
            EngineError::ScheduleRequired
            | EngineError::BlockConflict
            | EngineError::DoubleBooked
            | EngineError::AlreadyCanceled => 409,
            EngineError::Forbidden => 403,
            EngineError::WalError(_) => 500,
            _ => 422,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidSchedule(msg) => write!(f, "invalid schedule: {msg}"),
            EngineError::ScheduleRequired => {
                write!(f, "weekly schedule must be set before this operation")
            }
            EngineError::ProviderNotFound => write!(f, "provider not found"),
            EngineError::NotWorkingDay => write!(f, "not scheduled to work that day"),
            EngineError::InvalidAlignment => {
                write!(f, "start time must be in 15-minute increments")
            }
            EngineError::OutOfWorkingHours => write!(f, "must be within working hours"),
            EngineError::BlockConflict => write!(f, "overlaps an existing block"),
            EngineError::DoubleBooked => write!(f, "overlaps an existing appointment"),
            EngineError::UnknownService(key) => write!(f, "service not available: {key}"),
            EngineError::PastBooking => write!(f, "cannot book an appointment in the past"),
            EngineError::NotFound => write!(f, "not found"),
            EngineError::AlreadyCanceled => write!(f, "appointment already canceled"),
            EngineError::Forbidden => write!(f, "forbidden"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(EngineError::ProviderNotFound.status(), 404);
        assert_eq!(EngineError::NotFound.status(), 404);
        assert_eq!(EngineError::DoubleBooked.status(), 409);
        assert_eq!(EngineError::ScheduleRequired.status(), 409);
        assert_eq!(EngineError::AlreadyCanceled.status(), 409);
        assert_eq!(EngineError::Forbidden.status(), 403);
        assert_eq!(EngineError::InvalidAlignment.status(), 422);
        assert_eq!(EngineError::PastBooking.status(), 422);
    }

    #[test]
    fn labels_distinct() {
        let kinds = [
            EngineError::InvalidSchedule("x"),
            EngineError::ScheduleRequired,
            EngineError::ProviderNotFound,
            EngineError::NotWorkingDay,
            EngineError::InvalidAlignment,
            EngineError::OutOfWorkingHours,
            EngineError::BlockConflict,
            EngineError::DoubleBooked,
            EngineError::UnknownService("x".into()),
            EngineError::PastBooking,
            EngineError::NotFound,
            EngineError::AlreadyCanceled,
            EngineError::Forbidden,
        ];
        let mut labels: Vec<_> = kinds.iter().map(|k| k.label()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), kinds.len());
    }
}
