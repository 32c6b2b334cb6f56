use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::sync::oneshot;
use ulid::Ulid;

use crate::auth::{Identity, Role, require_role};
use crate::catalog;
use crate::limits::{
    LUNCH_BREAK_MINUTES, MAX_APPOINTMENTS_PER_PROVIDER, MAX_BLOCKS_PER_PROVIDER, MAX_ID_LEN,
    MAX_SERVICE_KEY_LEN,
};
use crate::model::*;
use crate::observability;

use super::conflict::{check_alignment, check_no_conflict, now};
use super::{Engine, EngineError, WalCommand};

fn check_id(id: &str) -> Result<(), EngineError> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(EngineError::LimitExceeded("identifier length"));
    }
    Ok(())
}

impl Engine {
    /// Create or wholesale-replace the caller's weekly schedule.
    ///
    /// Validation order: empty days, out-of-range day, duplicate day, then
    /// start/end ordering. The first rule broken wins.
    pub async fn upsert_schedule(
        &self,
        identity: &Identity,
        working_days: Vec<u8>,
        day_start: NaiveTime,
        day_end: NaiveTime,
    ) -> Result<ProviderSchedule, EngineError> {
        require_role(identity, Role::Provider)?;
        check_id(&identity.id)?;

        if working_days.is_empty() {
            return Err(EngineError::InvalidSchedule("working_days must not be empty"));
        }
        if working_days.iter().any(|&d| d > 6) {
            return Err(EngineError::InvalidSchedule("working_days entries must be 0-6"));
        }
        let mut seen = [false; 7];
        for &d in &working_days {
            if seen[d as usize] {
                return Err(EngineError::InvalidSchedule("working_days must not repeat"));
            }
            seen[d as usize] = true;
        }
        if day_start >= day_end {
            return Err(EngineError::InvalidSchedule("day_start must be before day_end"));
        }

        let event = Event::ScheduleSet {
            provider_id: identity.id.clone(),
            working_days,
            day_start,
            day_end,
        };

        let state_arc = self.ensure_provider(&identity.id)?;
        let mut state = state_arc.write().await;
        self.persist_and_apply(&mut state, &event).await?;
        metrics::counter!(observability::SCHEDULE_UPSERTS_TOTAL).increment(1);

        // persist_and_apply just set this.
        state
            .schedule
            .clone()
            .ok_or_else(|| EngineError::WalError("schedule missing after apply".into()))
    }

    /// Add a lunch break or a day off to the caller's calendar on `date`.
    /// For a day off `start_time` is ignored; the block covers the whole
    /// working window.
    pub async fn add_block(
        &self,
        identity: &Identity,
        date: NaiveDate,
        start_time: NaiveTime,
        kind: BlockKind,
    ) -> Result<Block, EngineError> {
        require_role(identity, Role::Provider)?;

        let state_arc = self
            .get_provider(&identity.id)
            .ok_or(EngineError::ScheduleRequired)?;
        let mut state = state_arc.write().await;
        let schedule = state.schedule.clone().ok_or(EngineError::ScheduleRequired)?;

        if !schedule.is_working_day(date) {
            return Err(EngineError::NotWorkingDay);
        }
        check_alignment(start_time)?;

        let window = schedule.window_on(date);
        let span = match kind {
            BlockKind::LunchBreak => {
                let start = date.and_time(start_time);
                Span::new(start, start + TimeDelta::minutes(LUNCH_BREAK_MINUTES))
            }
            BlockKind::DayOff => window,
        };
        if !window.contains_span(&span) {
            return Err(EngineError::OutOfWorkingHours);
        }

        if state.blocks.len() >= MAX_BLOCKS_PER_PROVIDER {
            return Err(EngineError::LimitExceeded("too many blocks"));
        }
        for existing in state.blocks_on(date) {
            if existing.span.overlaps(&span) {
                return Err(EngineError::BlockConflict);
            }
        }

        let block = Block {
            id: Ulid::new(),
            provider_id: identity.id.clone(),
            date,
            span,
            kind,
        };
        let event = Event::BlockAdded {
            id: block.id,
            provider_id: block.provider_id.clone(),
            date,
            span,
            kind,
        };
        self.persist_and_apply(&mut state, &event).await?;
        metrics::counter!(observability::BLOCKS_ADDED_TOTAL).increment(1);
        Ok(block)
    }

    /// Provider books a client into their own calendar.
    pub async fn book_as_provider(
        &self,
        identity: &Identity,
        client_id: &str,
        starts_at: NaiveDateTime,
        service: &str,
    ) -> Result<Appointment, EngineError> {
        require_role(identity, Role::Provider)?;
        check_id(client_id)?;
        self.book(&identity.id, client_id, starts_at, service, Role::Provider)
            .await
    }

    /// Client books themselves with a provider.
    pub async fn book_as_client(
        &self,
        identity: &Identity,
        provider_id: &str,
        starts_at: NaiveDateTime,
        service: &str,
    ) -> Result<Appointment, EngineError> {
        require_role(identity, Role::Client)?;
        check_id(provider_id)?;
        self.book(provider_id, &identity.id, starts_at, service, Role::Client)
            .await
    }

    /// The booking pipeline shared by both entry points. Validation order is
    /// part of the contract: service, alignment, past, provider existence,
    /// working day, working hours, overlap conflicts, then the exact-start
    /// uniqueness check under the write lock.
    async fn book(
        &self,
        provider_id: &str,
        client_id: &str,
        starts_at: NaiveDateTime,
        service: &str,
        booked_by: Role,
    ) -> Result<Appointment, EngineError> {
        if service.len() > MAX_SERVICE_KEY_LEN {
            return Err(EngineError::UnknownService(service.to_string()));
        }
        let duration = catalog::duration(service)
            .ok_or_else(|| EngineError::UnknownService(service.to_string()))?;
        check_alignment(starts_at.time())?;
        if starts_at < now() {
            return Err(EngineError::PastBooking);
        }

        // A provider with no state yet gets ScheduleRequired (it's their own
        // calendar); a client gets ProviderNotFound (the path target).
        let missing = match booked_by {
            Role::Provider => EngineError::ScheduleRequired,
            Role::Client => EngineError::ProviderNotFound,
        };
        let state_arc = self.get_provider(provider_id).ok_or(missing)?;
        let mut state = state_arc.write().await;
        let schedule = match (&state.schedule, booked_by) {
            (Some(s), _) => s.clone(),
            (None, Role::Provider) => return Err(EngineError::ScheduleRequired),
            (None, Role::Client) => return Err(EngineError::ProviderNotFound),
        };

        let date = starts_at.date();
        if !schedule.is_working_day(date) {
            return Err(EngineError::NotWorkingDay);
        }
        let span = Span::new(starts_at, starts_at + duration);
        if !schedule.window_on(date).contains_span(&span) {
            return Err(EngineError::OutOfWorkingHours);
        }
        if let Err(e) = check_no_conflict(&state, &span) {
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL, "kind" => e.label())
                .increment(1);
            return Err(e);
        }
        if state.appointments.len() >= MAX_APPOINTMENTS_PER_PROVIDER {
            return Err(EngineError::LimitExceeded("too many appointments"));
        }
        // Exact-start uniqueness, independent of the catalog: legacy rows with
        // retired service keys pass the overlap scan but still hold their slot.
        if state.has_booked_at(starts_at) {
            let e = EngineError::DoubleBooked;
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL, "kind" => e.label())
                .increment(1);
            return Err(e);
        }

        let appointment = Appointment {
            id: Ulid::new(),
            provider_id: provider_id.to_string(),
            client_id: client_id.to_string(),
            starts_at,
            service: service.to_string(),
            status: AppointmentStatus::Booked,
        };
        let event = Event::AppointmentBooked {
            id: appointment.id,
            provider_id: appointment.provider_id.clone(),
            client_id: appointment.client_id.clone(),
            starts_at,
            service: appointment.service.clone(),
        };
        self.persist_and_apply(&mut state, &event).await?;
        metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
        tracing::debug!(
            appointment = %appointment.id,
            provider = provider_id,
            %starts_at,
            service,
            "appointment booked"
        );
        Ok(appointment)
    }

    /// Cancel an appointment. Either party may cancel, exactly once.
    pub async fn cancel(
        &self,
        identity: &Identity,
        appointment_id: Ulid,
    ) -> Result<Appointment, EngineError> {
        let provider_id = self
            .provider_for_appointment(&appointment_id)
            .ok_or(EngineError::NotFound)?;
        let state_arc = self
            .get_provider(&provider_id)
            .ok_or(EngineError::NotFound)?;
        let mut state = state_arc.write().await;

        let mut appointment = state
            .appointment(appointment_id)
            .cloned()
            .ok_or(EngineError::NotFound)?;
        if appointment.status == AppointmentStatus::Canceled {
            return Err(EngineError::AlreadyCanceled);
        }
        if identity.id != appointment.client_id && identity.id != appointment.provider_id {
            return Err(EngineError::Forbidden);
        }

        let event = Event::AppointmentCanceled {
            id: appointment_id,
            provider_id: provider_id.clone(),
        };
        self.persist_and_apply(&mut state, &event).await?;
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        appointment.status = AppointmentStatus::Canceled;
        Ok(appointment)
    }

    /// Snapshot all live state as a minimal event stream and rewrite the WAL
    /// with it. Canceled appointments survive compaction as a book + cancel
    /// pair so the ledger stays complete across restarts.
    ///
    /// The snapshot is taken without blocking writers, so a booking can
    /// commit to the old log while the rewrite is prepared. Each attempt is
    /// tagged with the append count observed before snapshotting; the WAL
    /// writer refuses a stale rewrite and we snapshot again. An event counted
    /// in the tag is always in the snapshot (commits hold the provider write
    /// lock until applied), so a refused attempt is the only way a racing
    /// commit and a compaction can meet.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        const MAX_ATTEMPTS: u32 = 5;
        for attempt in 0..MAX_ATTEMPTS {
            let expected_appends = self.wal_appends_since_compact().await?;
            let events = self.snapshot_events().await;

            let (tx, rx) = oneshot::channel();
            self.wal_tx
                .send(WalCommand::Compact {
                    events,
                    expected_appends,
                    response: tx,
                })
                .await
                .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
            let swapped = rx
                .await
                .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
                .map_err(|e| EngineError::WalError(e.to_string()))?;
            if swapped {
                return Ok(());
            }
            tracing::debug!(attempt, "compaction snapshot went stale, retrying");
        }
        Err(EngineError::WalError(
            "compaction kept losing to concurrent appends".into(),
        ))
    }

    async fn snapshot_events(&self) -> Vec<Event> {
        let handles: Vec<_> = self
            .state
            .iter()
            .map(|e| e.value().clone())
            .collect();

        let mut events = Vec::new();
        for handle in handles {
            let state = handle.read().await;
            if let Some(schedule) = &state.schedule {
                events.push(Event::ScheduleSet {
                    provider_id: schedule.provider_id.clone(),
                    working_days: schedule.working_days.clone(),
                    day_start: schedule.day_start,
                    day_end: schedule.day_end,
                });
            }
            for block in &state.blocks {
                events.push(Event::BlockAdded {
                    id: block.id,
                    provider_id: block.provider_id.clone(),
                    date: block.date,
                    span: block.span,
                    kind: block.kind,
                });
            }
            for appointment in &state.appointments {
                events.push(Event::AppointmentBooked {
                    id: appointment.id,
                    provider_id: appointment.provider_id.clone(),
                    client_id: appointment.client_id.clone(),
                    starts_at: appointment.starts_at,
                    service: appointment.service.clone(),
                });
                if appointment.status == AppointmentStatus::Canceled {
                    events.push(Event::AppointmentCanceled {
                        id: appointment.id,
                        provider_id: appointment.provider_id.clone(),
                    });
                }
            }
        }
        events
    }

    /// Appends written since the last compaction, for the threshold check.
    pub async fn wal_appends_since_compact(&self) -> Result<u64, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))
    }
}
