use chrono::{NaiveDate, NaiveTime};

use crate::auth::{Identity, Role, require_role};
use crate::model::*;
use crate::observability;

use super::availability::free_slot_starts;
use super::conflict::{block_spans_on, booked_spans_on};
use super::{Engine, EngineError, SharedProviderState};

impl Engine {
    /// Free slot starts for a provider on a date, in chronological order.
    /// Open to anyone; no identity required.
    pub async fn availability(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<NaiveTime>, EngineError> {
        metrics::counter!(observability::AVAILABILITY_QUERIES_TOTAL).increment(1);

        let state_arc = self
            .get_provider(provider_id)
            .ok_or(EngineError::ProviderNotFound)?;
        let state = state_arc.read().await;
        let schedule = state.schedule.as_ref().ok_or(EngineError::ProviderNotFound)?;

        if !schedule.is_working_day(date) {
            return Ok(Vec::new());
        }
        // A day off empties the whole day even when the block's stored span
        // happens to be narrower than the current working window.
        if state.blocks_on(date).any(|b| b.kind == BlockKind::DayOff) {
            return Ok(Vec::new());
        }

        let window = schedule.window_on(date);
        let mut busy = block_spans_on(&state, date);
        busy.extend(booked_spans_on(&state, date));
        Ok(free_slot_starts(&window, &busy))
    }

    /// The caller's own weekly schedule.
    pub async fn get_schedule(&self, identity: &Identity) -> Result<ProviderSchedule, EngineError> {
        require_role(identity, Role::Provider)?;
        let state_arc = self
            .get_provider(&identity.id)
            .ok_or(EngineError::NotFound)?;
        let state = state_arc.read().await;
        state.schedule.clone().ok_or(EngineError::NotFound)
    }

    /// Appointments on the caller's own calendar, optionally narrowed to one
    /// date, ordered by start.
    pub async fn list_provider_appointments(
        &self,
        identity: &Identity,
        filter: StatusFilter,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, EngineError> {
        require_role(identity, Role::Provider)?;
        let Some(state_arc) = self.get_provider(&identity.id) else {
            return Ok(Vec::new());
        };
        let state = state_arc.read().await;
        Ok(state
            .appointments
            .iter()
            .filter(|a| filter.matches(a.status))
            .filter(|a| date.is_none_or(|d| a.starts_at.date() == d))
            .cloned()
            .collect())
    }

    /// All of the caller's appointments across every provider, ordered by
    /// start.
    pub async fn list_client_appointments(
        &self,
        identity: &Identity,
        filter: StatusFilter,
    ) -> Result<Vec<Appointment>, EngineError> {
        require_role(identity, Role::Client)?;

        // Collect the Arcs first so no map shard guard is held across awaits.
        let handles: Vec<SharedProviderState> =
            self.state.iter().map(|e| e.value().clone()).collect();

        let mut out = Vec::new();
        for handle in handles {
            let state = handle.read().await;
            out.extend(
                state
                    .appointments
                    .iter()
                    .filter(|a| a.client_id == identity.id && filter.matches(a.status))
                    .cloned(),
            );
        }
        out.sort_by_key(|a| a.starts_at);
        Ok(out)
    }
}
