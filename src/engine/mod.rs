mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{free_slot_starts, slot_grid};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedProviderState = Arc<RwLock<ProviderState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        /// Append count the snapshot was taken against. The writer refuses
        /// the rewrite when appends have landed since, so a booking committed
        /// after the snapshot can never be dropped from the log.
        expected_appends: u64,
        response: oneshot::Sender<io::Result<bool>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact {
            events,
            expected_appends,
            response,
        } => {
            // The snapshot is stale if anything was appended after it was
            // taken; the caller retries with a fresh one.
            if wal.appends_since_compact() != expected_appends {
                let _ = response.send(Ok(false));
            } else {
                let result = Wal::write_compact_file(wal.path(), &events)
                    .and_then(|()| wal.swap_compact_file())
                    .map(|()| true);
                let _ = response.send(result);
            }
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The scheduling engine for one tenant (one shop): all provider state,
/// the WAL writer, and the notify hub.
pub struct Engine {
    pub(super) state: DashMap<String, SharedProviderState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: appointment id → provider id, for cancel.
    pub(super) appointment_index: DashMap<Ulid, String>,
}

/// Apply an event directly to a ProviderState (no locking — caller holds the lock).
fn apply_to_provider(state: &mut ProviderState, event: &Event, index: &DashMap<Ulid, String>) {
    match event {
        Event::ScheduleSet {
            provider_id,
            working_days,
            day_start,
            day_end,
        } => {
            state.schedule = Some(ProviderSchedule {
                provider_id: provider_id.clone(),
                working_days: working_days.clone(),
                day_start: *day_start,
                day_end: *day_end,
            });
        }
        Event::BlockAdded {
            id,
            provider_id,
            date,
            span,
            kind,
        } => {
            state.insert_block(Block {
                id: *id,
                provider_id: provider_id.clone(),
                date: *date,
                span: *span,
                kind: *kind,
            });
        }
        Event::AppointmentBooked {
            id,
            provider_id,
            client_id,
            starts_at,
            service,
        } => {
            state.insert_appointment(Appointment {
                id: *id,
                provider_id: provider_id.clone(),
                client_id: client_id.clone(),
                starts_at: *starts_at,
                service: service.clone(),
                status: AppointmentStatus::Booked,
            });
            index.insert(*id, provider_id.clone());
        }
        Event::AppointmentCanceled { id, .. } => {
            // The ledger never deletes; the row stays, status flips once.
            if let Some(appointment) = state.appointment_mut(*id) {
                appointment.status = AppointmentStatus::Canceled;
            }
        }
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            notify,
            appointment_index: DashMap::new(),
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context (e.g. lazy tenant
        // creation).
        for event in &events {
            let provider_id = event.provider_id().to_string();
            let entry = engine
                .state
                .entry(provider_id.clone())
                .or_insert_with(|| Arc::new(RwLock::new(ProviderState::new(provider_id))));
            let state_arc = entry.value().clone();
            drop(entry);
            let mut guard = state_arc.try_write().expect("replay: uncontended write");
            apply_to_provider(&mut guard, event, &engine.appointment_index);
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_provider(&self, provider_id: &str) -> Option<SharedProviderState> {
        self.state.get(provider_id).map(|e| e.value().clone())
    }

    /// Look up or create the state slot for a provider.
    pub(super) fn ensure_provider(
        &self,
        provider_id: &str,
    ) -> Result<SharedProviderState, EngineError> {
        if let Some(existing) = self.get_provider(provider_id) {
            return Ok(existing);
        }
        if self.state.len() >= crate::limits::MAX_PROVIDERS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many providers"));
        }
        let entry = self
            .state
            .entry(provider_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(ProviderState::new(provider_id.to_string()))));
        Ok(entry.value().clone())
    }

    pub fn provider_for_appointment(&self, appointment_id: &Ulid) -> Option<String> {
        self.appointment_index
            .get(appointment_id)
            .map(|e| e.value().clone())
    }

    /// WAL-append + apply + notify in one call, under the caller's write lock.
    /// The WAL append happens first: if it fails, no state changes.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut ProviderState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_provider(state, event, &self.appointment_index);
        self.notify.send(event.provider_id(), event);
        Ok(())
    }
}
