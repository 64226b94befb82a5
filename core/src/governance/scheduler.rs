//! Reminder scheduler (C11).
//!
//! A small pure-data structure: all state is plain data the caller owns
//! and persists; this module only computes and pops ticks.

use serde::{Deserialize, Serialize};

use crate::governance::types::Timestamp;

/// Offsets, in hours before a session's `endTime`, at which a reminder
/// tick is scheduled (spec.md §4.11).
const REMINDER_OFFSETS_HOURS: [i64; 4] = [72, 24, 6, 1];

/// One pending reminder tick (spec.md §6, `reminder_schedule.json`).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTick {
    pub scheduled_for: Timestamp,
    pub hours_before_deadline: i64,
    pub minute_id: String,
}

/// Computes the reminder ticks for a session ending at `end_time`,
/// discarding any tick that would already be in the past relative to
/// `now` (spec.md §4.11).
pub fn compute_ticks(minute_id: &str, end_time: Timestamp, now: Timestamp) -> Vec<ReminderTick> {
    REMINDER_OFFSETS_HOURS
        .iter()
        .filter_map(|hours| {
            let scheduled_for = end_time.plus_hours(-hours);
            if scheduled_for.as_millis() <= now.as_millis() {
                return None;
            }
            Some(ReminderTick {
                scheduled_for,
                hours_before_deadline: *hours,
                minute_id: minute_id.to_string(),
            })
        })
        .collect()
}

/// An ordered, persisted list of pending reminder ticks for one session.
///
/// Persistence itself is the caller's responsibility (spec.md §6); this
/// type only holds the in-memory list and implements `poll`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReminderSchedule {
    ticks: Vec<ReminderTick>,
}

impl ReminderSchedule {
    pub fn new(ticks: Vec<ReminderTick>) -> Self {
        Self { ticks }
    }

    pub fn ticks(&self) -> &[ReminderTick] {
        &self.ticks
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Returns and removes every tick with `scheduled_for <= now`, in
    /// ascending `scheduled_for` order (spec.md §4.11).
    pub fn poll(&mut self, now: Timestamp) -> Vec<ReminderTick> {
        let (due, pending): (Vec<ReminderTick>, Vec<ReminderTick>) =
            self.ticks.drain(..).partition(|tick| tick.scheduled_for.as_millis() <= now.as_millis());
        self.ticks = pending;

        let mut due = due;
        due.sort_by_key(|tick| tick.scheduled_for.as_millis());
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_ticks_discards_past_offsets() {
        let end_time = Timestamp::from_millis(100 * 3_600_000);
        // `now` is 30 hours before the deadline: only the 24h/6h/1h ticks remain.
        let now = end_time.plus_hours(-30);
        let ticks = compute_ticks("2026-07", end_time, now);
        assert_eq!(ticks.len(), 3);
        assert_eq!(ticks[0].hours_before_deadline, 24);
        assert_eq!(ticks[2].hours_before_deadline, 1);
    }

    #[test]
    fn poll_removes_and_returns_only_due_ticks() {
        let end_time = Timestamp::from_millis(100 * 3_600_000);
        let now = Timestamp::from_millis(0);
        let mut schedule = ReminderSchedule::new(compute_ticks("2026-07", end_time, now));
        assert_eq!(schedule.ticks().len(), 4);

        let first_due_at = end_time.plus_hours(-72);
        let due = schedule.poll(first_due_at);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].hours_before_deadline, 72);
        assert_eq!(schedule.ticks().len(), 3);

        let none_yet = schedule.poll(first_due_at.plus_millis(1));
        assert!(none_yet.is_empty());
    }
}
