use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open interval `[start, end)` on the shop's naive local clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Exact half-open intersection test. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Weekday index with Monday = 0, matching `working_days` entries.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// One provider's weekly availability pattern. One record per provider,
/// replaced wholesale on upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSchedule {
    pub provider_id: String,
    /// Weekday indices 0–6, Monday = 0. Validated non-empty, in-range,
    /// duplicate-free at upsert.
    pub working_days: Vec<u8>,
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
}

impl ProviderSchedule {
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&weekday_index(date))
    }

    /// The `[day_start, day_end)` window projected onto a concrete date.
    /// Does not check whether the date is a working day.
    pub fn window_on(&self, date: NaiveDate) -> Span {
        Span::new(date.and_time(self.day_start), date.and_time(self.day_end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Carves a fixed 30-minute sub-interval out of the working window.
    LunchBreak,
    /// Spans the entire working window; the day yields no availability.
    DayOff,
}

/// A per-date exception to a provider's working window. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: Ulid,
    pub provider_id: String,
    pub date: NaiveDate,
    pub span: Span,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Booked,
    Canceled,
}

/// One ledger entry. `ends_at` is always derived from the service catalog,
/// never stored. `service` stays a raw string because the ledger tolerates
/// keys that have since left the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub provider_id: String,
    pub client_id: String,
    pub starts_at: NaiveDateTime,
    pub service: String,
    pub status: AppointmentStatus,
}

/// Appointment listing filter. Typed replacement for the stringly status
/// query parameter of earlier iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Booked,
    Canceled,
    All,
}

impl StatusFilter {
    pub fn matches(&self, status: AppointmentStatus) -> bool {
        match self {
            StatusFilter::Booked => status == AppointmentStatus::Booked,
            StatusFilter::Canceled => status == AppointmentStatus::Canceled,
            StatusFilter::All => true,
        }
    }
}

/// All scheduling state for one provider: the weekly schedule, the per-date
/// blocks, and the appointment ledger. Blocks and appointments are kept
/// sorted by start for ordered reads.
#[derive(Debug, Clone)]
pub struct ProviderState {
    pub provider_id: String,
    pub schedule: Option<ProviderSchedule>,
    pub blocks: Vec<Block>,
    pub appointments: Vec<Appointment>,
}

impl ProviderState {
    pub fn new(provider_id: String) -> Self {
        Self {
            provider_id,
            schedule: None,
            blocks: Vec::new(),
            appointments: Vec::new(),
        }
    }

    /// Insert a block maintaining sort order by span start.
    pub fn insert_block(&mut self, block: Block) {
        let pos = self
            .blocks
            .binary_search_by_key(&block.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.blocks.insert(pos, block);
    }

    /// Insert an appointment maintaining sort order by start instant.
    pub fn insert_appointment(&mut self, appointment: Appointment) {
        let pos = self
            .appointments
            .binary_search_by_key(&appointment.starts_at, |a| a.starts_at)
            .unwrap_or_else(|e| e);
        self.appointments.insert(pos, appointment);
    }

    /// Storage-level uniqueness constraint on `(provider, starts_at)`:
    /// true if a booked appointment already occupies this exact start.
    /// Catalog membership is deliberately ignored here — a legacy row with an
    /// unknown service key still claims its start instant.
    pub fn has_booked_at(&self, starts_at: NaiveDateTime) -> bool {
        self.appointments
            .iter()
            .any(|a| a.status == AppointmentStatus::Booked && a.starts_at == starts_at)
    }

    pub fn blocks_on(&self, date: NaiveDate) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.date == date)
    }

    pub fn appointments_on(&self, date: NaiveDate) -> impl Iterator<Item = &Appointment> {
        self.appointments
            .iter()
            .filter(move |a| a.starts_at.date() == date)
    }

    pub fn appointment(&self, id: Ulid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn appointment_mut(&mut self, id: Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleSet {
        provider_id: String,
        working_days: Vec<u8>,
        day_start: NaiveTime,
        day_end: NaiveTime,
    },
    BlockAdded {
        id: Ulid,
        provider_id: String,
        date: NaiveDate,
        span: Span,
        kind: BlockKind,
    },
    AppointmentBooked {
        id: Ulid,
        provider_id: String,
        client_id: String,
        starts_at: NaiveDateTime,
        service: String,
    },
    AppointmentCanceled {
        id: Ulid,
        provider_id: String,
    },
}

impl Event {
    pub fn provider_id(&self) -> &str {
        match self {
            Event::ScheduleSet { provider_id, .. }
            | Event::BlockAdded { provider_id, .. }
            | Event::AppointmentBooked { provider_id, .. }
            | Event::AppointmentCanceled { provider_id, .. } => provider_id,
        }
    }
}
