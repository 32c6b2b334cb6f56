use chrono::{NaiveTime, TimeDelta};

use crate::limits::SLOT_MINUTES;
use crate::model::Span;

// ── Slot-grid availability ────────────────────────────────────────

/// Partition a working window into the contiguous grid of fixed-width slots.
/// The grid starts at `window.start`; a trailing partial slot is dropped.
pub fn slot_grid(window: &Span) -> Vec<Span> {
    let width = TimeDelta::minutes(SLOT_MINUTES as i64);
    let mut slots = Vec::new();
    let mut cursor = window.start;
    while cursor + width <= window.end {
        slots.push(Span::new(cursor, cursor + width));
        cursor += width;
    }
    slots
}

/// Slot starts within the window that overlap none of the busy intervals,
/// in chronological order. Recomputed fresh on every call; nothing is cached.
pub fn free_slot_starts(window: &Span, busy: &[Span]) -> Vec<NaiveTime> {
    slot_grid(window)
        .into_iter()
        .filter(|slot| !busy.iter().any(|b| b.overlaps(slot)))
        .map(|slot| slot.start.time())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, 7)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn grid_covers_window() {
        let window = Span::new(dt(9, 0), dt(10, 0));
        let grid = slot_grid(&window);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0], Span::new(dt(9, 0), dt(9, 15)));
        assert_eq!(grid[3], Span::new(dt(9, 45), dt(10, 0)));
    }

    #[test]
    fn grid_drops_trailing_partial_slot() {
        let window = Span::new(dt(9, 0), dt(9, 50));
        let grid = slot_grid(&window);
        // 9:45–10:00 would poke past 9:50, so only three slots fit.
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.last().unwrap().end, dt(9, 45));
    }

    #[test]
    fn full_day_grid_size() {
        // 09:00–18:00 is nine hours = 36 quarter-hour slots.
        let window = Span::new(dt(9, 0), dt(18, 0));
        assert_eq!(slot_grid(&window).len(), 36);
    }

    #[test]
    fn free_starts_without_busy() {
        let window = Span::new(dt(9, 0), dt(10, 0));
        let free = free_slot_starts(&window, &[]);
        assert_eq!(free, vec![t(9, 0), t(9, 15), t(9, 30), t(9, 45)]);
    }

    #[test]
    fn busy_interval_excludes_overlapping_slots_only() {
        // A 12:00–12:30 break excludes the 12:00 and 12:15 starts, but
        // leaves the touching 11:45 and 12:30 slots alone.
        let window = Span::new(dt(11, 30), dt(13, 0));
        let busy = vec![Span::new(dt(12, 0), dt(12, 30))];
        let free = free_slot_starts(&window, &busy);
        assert_eq!(free, vec![t(11, 30), t(11, 45), t(12, 30), t(12, 45)]);
    }

    #[test]
    fn busy_spanning_whole_window_yields_empty() {
        let window = Span::new(dt(9, 0), dt(18, 0));
        let busy = vec![Span::new(dt(9, 0), dt(18, 0))];
        assert!(free_slot_starts(&window, &busy).is_empty());
    }

    #[test]
    fn misaligned_busy_interval_shadows_both_slots() {
        // A booking at 9:10–9:40 (legacy data) overlaps the 9:00, 9:15 and 9:30 slots.
        let window = Span::new(dt(9, 0), dt(10, 0));
        let busy = vec![Span::new(dt(9, 10), dt(9, 40))];
        let free = free_slot_starts(&window, &busy);
        assert_eq!(free, vec![t(9, 45)]);
    }
}
