//! Per-session counters.

use chrono::{DateTime, NaiveDate, Utc};
use photosweep_common::Disposition;
use serde::{Deserialize, Serialize};

/// Counters of one sorting session.
///
/// Created when a session starts and frozen once `ended_at` is stamped; a
/// frozen record ignores further updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSessionStats {
    /// Photos that left UNSORTED this session
    pub total_sorted: u32,
    pub kept_count: u32,
    pub trashed_count: u32,
    pub maybe_count: u32,
    /// Photos kept straight into an album while swiping
    pub tagged_count: u32,
    /// Longest run of consecutive swipes without an undo
    pub max_combo: u32,
    #[serde(default)]
    pub current_combo: u32,
    pub classified_to_album_count: u32,
    pub skipped_classify_count: u32,
    pub permanently_deleted_count: u32,
    pub restored_from_trash_count: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Default for WorkflowSessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowSessionStats {
    pub fn new() -> Self {
        Self {
            total_sorted: 0,
            kept_count: 0,
            trashed_count: 0,
            maybe_count: 0,
            tagged_count: 0,
            max_combo: 0,
            current_combo: 0,
            classified_to_album_count: 0,
            skipped_classify_count: 0,
            permanently_deleted_count: 0,
            restored_from_trash_count: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Stamp the end time. Idempotent: the first stamp wins.
    pub fn finish(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    /// Drop the end stamp after the advance into VICTORY was undone.
    pub fn reopen(&mut self) {
        self.ended_at = None;
    }

    /// Elapsed session time, up to now when still running.
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Count a disposition assignment. `from` is the photo's disposition
    /// before the assignment; `swiping` extends the combo.
    pub fn record_disposition(&mut self, from: Disposition, to: Disposition, swiping: bool) {
        if self.is_frozen() || from == to {
            return;
        }
        if from == Disposition::Unsorted {
            self.total_sorted += 1;
        }
        if let Some(counter) = self.counter_mut(to) {
            *counter += 1;
        }
        if swiping {
            self.current_combo += 1;
            self.max_combo = self.max_combo.max(self.current_combo);
        }
    }

    /// Reverse `record_disposition` after an undo. Breaks the combo.
    pub fn revert_disposition(&mut self, from: Disposition, to: Disposition) {
        if self.is_frozen() || from == to {
            return;
        }
        if from == Disposition::Unsorted {
            self.total_sorted = self.total_sorted.saturating_sub(1);
        }
        if let Some(counter) = self.counter_mut(to) {
            *counter = counter.saturating_sub(1);
        }
        self.break_combo();
    }

    pub fn break_combo(&mut self) {
        self.current_combo = 0;
    }

    pub fn record_tagged(&mut self) {
        if !self.is_frozen() {
            self.tagged_count += 1;
        }
    }

    pub fn revert_tagged(&mut self) {
        if !self.is_frozen() {
            self.tagged_count = self.tagged_count.saturating_sub(1);
        }
    }

    pub fn record_classified(&mut self) {
        if !self.is_frozen() {
            self.classified_to_album_count += 1;
        }
    }

    pub fn revert_classified(&mut self) {
        if !self.is_frozen() {
            self.classified_to_album_count = self.classified_to_album_count.saturating_sub(1);
        }
    }

    pub fn record_skipped(&mut self) {
        if !self.is_frozen() {
            self.skipped_classify_count += 1;
        }
    }

    pub fn revert_skipped(&mut self, count: u32) {
        if !self.is_frozen() {
            self.skipped_classify_count = self.skipped_classify_count.saturating_sub(count);
        }
    }

    pub fn record_restored(&mut self, count: u32) {
        if !self.is_frozen() {
            self.restored_from_trash_count += count;
        }
    }

    pub fn record_deleted(&mut self, count: u32) {
        if !self.is_frozen() {
            self.permanently_deleted_count += count;
        }
    }

    fn counter_mut(&mut self, disposition: Disposition) -> Option<&mut u32> {
        match disposition {
            Disposition::Keep => Some(&mut self.kept_count),
            Disposition::Maybe => Some(&mut self.maybe_count),
            Disposition::Trash => Some(&mut self.trashed_count),
            Disposition::Unsorted => None,
        }
    }
}

/// First-time sorts made today by sessions that have already closed.
///
/// The daily quota spans every session of a day, so the engine adds each
/// session's `total_sorted` here when the session is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTally {
    day: NaiveDate,
    sorted: u32,
}

impl DailyTally {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            day: today,
            sorted: 0,
        }
    }

    /// Add a closed session's sorts. A new day starts from zero.
    pub fn carry(&mut self, today: NaiveDate, sorted: u32) {
        if today != self.day {
            self.day = today;
            self.sorted = 0;
        }
        self.sorted = self.sorted.saturating_add(sorted);
    }

    /// Sorts carried for `today`.
    pub fn carried(&self, today: NaiveDate) -> u32 {
        if today == self.day { self.sorted } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_time_sort_counts_total() {
        let mut stats = WorkflowSessionStats::new();
        stats.record_disposition(Disposition::Unsorted, Disposition::Keep, true);
        stats.record_disposition(Disposition::Maybe, Disposition::Keep, false);

        assert_eq!(stats.total_sorted, 1);
        assert_eq!(stats.kept_count, 2);
    }

    #[test]
    fn test_combo_tracks_high_water_mark() {
        let mut stats = WorkflowSessionStats::new();
        for _ in 0..3 {
            stats.record_disposition(Disposition::Unsorted, Disposition::Trash, true);
        }
        stats.revert_disposition(Disposition::Unsorted, Disposition::Trash);
        stats.record_disposition(Disposition::Unsorted, Disposition::Keep, true);

        assert_eq!(stats.max_combo, 3);
        assert_eq!(stats.current_combo, 1);
        assert_eq!(stats.trashed_count, 2);
        assert_eq!(stats.total_sorted, 3);
    }

    #[test]
    fn test_revert_saturates_at_zero() {
        let mut stats = WorkflowSessionStats::new();
        stats.revert_disposition(Disposition::Unsorted, Disposition::Maybe);
        stats.revert_classified();
        stats.record_skipped();
        stats.revert_skipped(3);
        assert_eq!(stats.maybe_count, 0);
        assert_eq!(stats.skipped_classify_count, 0);
        assert_eq!(stats.total_sorted, 0);
        assert_eq!(stats.classified_to_album_count, 0);
    }

    #[test]
    fn test_finish_freezes_counters() {
        let mut stats = WorkflowSessionStats::new();
        stats.record_deleted(2);
        stats.finish();
        let ended = stats.ended_at;
        assert!(ended.is_some());

        stats.record_deleted(5);
        stats.record_disposition(Disposition::Unsorted, Disposition::Keep, true);
        stats.finish();

        assert_eq!(stats.permanently_deleted_count, 2);
        assert_eq!(stats.kept_count, 0);
        assert_eq!(stats.ended_at, ended);
    }

    #[test]
    fn test_daily_tally_resets_on_a_new_day() {
        let monday = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();
        let mut tally = DailyTally::new(monday);

        tally.carry(monday, 4);
        tally.carry(monday, 3);
        assert_eq!(tally.carried(monday), 7);
        assert_eq!(tally.carried(tuesday), 0);

        tally.carry(tuesday, 2);
        assert_eq!(tally.carried(tuesday), 2);
        assert_eq!(tally.carried(monday), 0);
    }

    #[test]
    fn test_same_disposition_is_not_counted() {
        let mut stats = WorkflowSessionStats::new();
        stats.record_disposition(Disposition::Keep, Disposition::Keep, true);
        assert_eq!(stats.kept_count, 0);
        assert_eq!(stats.current_combo, 0);
    }
}
