//! The workflow snapshot and the pure function that builds it.

use photosweep_common::{
    Album, ConfirmationHandle, DailyTaskStatus, FilterMode, PhotoId, PhotoRecord,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::cleanup::BatchOutcome;
use crate::engine::{EngineState, LaunchMode};
use crate::session::WorkflowSessionStats;
use crate::stage::{self, WorkflowStage};
use crate::workflow::SessionId;

/// Unsorted photos the SWIPE stage works through under `filter`.
pub fn swipe_pool(unsorted: &[PhotoRecord], filter: &FilterMode) -> Vec<PhotoRecord> {
    unsorted
        .iter()
        .filter(|photo| filter.matches(photo))
        .cloned()
        .collect()
}

/// Quota status of a daily-task session; `None` outside daily-task mode or
/// without a target. `sorted_today` counts first-time sorts of every
/// session of the day, the running one included.
pub fn daily_status(mode: LaunchMode, target: u32, sorted_today: u32) -> Option<DailyTaskStatus> {
    match mode {
        LaunchMode::DailyTask if target > 0 => Some(DailyTaskStatus {
            target,
            current: sorted_today,
        }),
        _ => None,
    }
}

/// Remaining unsorted work, capped at the day's quota when one applies.
pub fn swipe_remaining(pool: usize, daily: Option<DailyTaskStatus>) -> usize {
    match daily {
        Some(status) => status.clamp(pool),
        None => pool,
    }
}

/// Immutable view of a session, republished whenever any input changes.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    /// Engine revision this snapshot was built from
    pub revision: u64,
    pub session: SessionId,
    pub launch_mode: LaunchMode,
    pub stage: WorkflowStage,
    pub title_key: &'static str,
    pub subtitle_key: &'static str,
    /// Position of the stage among the functional stages; `None` at VICTORY
    pub stage_index: Option<usize>,
    pub stage_count: usize,
    pub progress: f32,
    pub advance_enabled: bool,
    pub advance_pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_pending: Option<ConfirmationHandle>,
    pub can_undo: bool,
    pub unsorted_remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_unsorted: Option<PhotoRecord>,
    pub compare_photos: Vec<PhotoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classify_current: Option<PhotoRecord>,
    pub classify_remaining: usize,
    pub classify_total: usize,
    pub trash_photos: Vec<PhotoRecord>,
    pub trash_selection: Vec<PhotoId>,
    pub albums: Vec<Album>,
    pub filter_mode: FilterMode,
    pub classification_on_swipe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_task: Option<DailyTaskStatus>,
    pub stats: WorkflowSessionStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_batch: Option<BatchOutcome>,
}

/// Latest value of every input, borrowed for one composition.
pub struct AggregatorInputs<'a> {
    pub state: &'a EngineState,
    pub unsorted: &'a [PhotoRecord],
    pub keep: &'a [PhotoRecord],
    pub maybe: &'a [PhotoRecord],
    pub trash: &'a [PhotoRecord],
    pub albums: &'a [Album],
    pub filter_mode: &'a FilterMode,
    pub daily_task_target: u32,
}

/// Materialize session ids against the store's current records, keeping
/// only photos that still carry the matching disposition.
fn materialize(ids: &BTreeSet<PhotoId>, records: &[PhotoRecord]) -> Vec<PhotoRecord> {
    records
        .iter()
        .filter(|r| ids.contains(&r.id))
        .cloned()
        .collect()
}

impl AggregatorInputs<'_> {
    /// Build the snapshot. Pure: same inputs, same snapshot.
    pub fn compose(&self) -> WorkflowSnapshot {
        let machine = &self.state.machine;
        let stage = machine.stage();
        let on_swipe = machine.classification_on_swipe();
        let sets = machine.sets();

        let pool = swipe_pool(self.unsorted, self.filter_mode);
        let daily = daily_status(
            self.state.launch_mode,
            self.daily_task_target,
            self.state.sorted_today,
        );
        let unsorted_remaining = swipe_remaining(pool.len(), daily);
        let next_unsorted = if unsorted_remaining > 0 {
            pool.into_iter().next()
        } else {
            None
        };

        let (classify_current, classify_remaining, classify_total) =
            match machine.classify_queue() {
                Some(queue) => {
                    let by_id: HashMap<PhotoId, &PhotoRecord> =
                        self.keep.iter().map(|r| (r.id, r)).collect();
                    let current = queue
                        .current()
                        .and_then(|id| by_id.get(&id).map(|r| (*r).clone()));
                    (current, queue.remaining(), queue.total())
                }
                None => (None, 0, 0),
            };

        let functional = stage::functional_stages(on_swipe);

        WorkflowSnapshot {
            revision: self.state.revision,
            session: machine.session_id(),
            launch_mode: self.state.launch_mode,
            stage,
            title_key: stage.title_key(),
            subtitle_key: stage.subtitle_key(),
            stage_index: functional.iter().position(|s| *s == stage),
            stage_count: functional.len(),
            progress: stage::stage_progress(stage, on_swipe),
            advance_enabled: !stage.is_terminal() && self.state.pending_delete.is_none(),
            advance_pending: machine.advance_pending(),
            delete_pending: self.state.pending_delete.clone(),
            can_undo: self.state.can_undo,
            unsorted_remaining,
            next_unsorted,
            compare_photos: materialize(&sets.maybe, self.maybe),
            classify_current,
            classify_remaining,
            classify_total,
            trash_photos: materialize(&sets.trash, self.trash),
            trash_selection: machine.trash_selection().iter().copied().collect(),
            albums: self.albums.to_vec(),
            filter_mode: self.filter_mode.clone(),
            classification_on_swipe: on_swipe,
            daily_task: daily,
            stats: machine.stats().clone(),
            last_batch: self.state.last_batch.clone(),
        }
    }
}
