//! Stage state machine of a sorting session.
//!
//! The machine is plain data: every operation is synchronous and
//! infallible, and cloning it is cheap (session sets, the classify list and
//! the trash selection are shared copy-on-write). The engine publishes a
//! clone after every transition, so readers always see a whole state.

use photosweep_common::{Disposition, PhotoId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AdvanceRequest, ClassifyQueue, SessionId, StageRewind, StageTransition, TrashRemoval};
use crate::session::{SessionOutcomeSets, SessionTracker, WorkflowSessionStats};
use crate::stage::{self, WorkflowStage};

#[derive(Debug, Clone)]
pub struct WorkflowStateMachine {
    session: SessionId,
    stage: WorkflowStage,
    classification_on_swipe: bool,
    tracker: SessionTracker,
    stats: WorkflowSessionStats,
    /// Size of the (filtered, quota-capped) unsorted pool, as last observed
    unsorted_remaining: usize,
    /// Set by any mutation made in the current stage, cleared on advance
    touched_in_stage: bool,
    advance_pending: bool,
    classify: Option<ClassifyQueue>,
    trash_selection: Arc<BTreeSet<PhotoId>>,
}

impl WorkflowStateMachine {
    pub fn new(classification_on_swipe: bool) -> Self {
        Self {
            session: Uuid::new_v4(),
            stage: WorkflowStage::Swipe,
            classification_on_swipe,
            tracker: SessionTracker::new(),
            stats: WorkflowSessionStats::new(),
            unsorted_remaining: 0,
            touched_in_stage: false,
            advance_pending: false,
            classify: None,
            trash_selection: Arc::new(BTreeSet::new()),
        }
    }

    /// Begin a new session: fresh id, empty session sets, fresh stats, SWIPE.
    pub fn start(&mut self) -> SessionId {
        self.session = Uuid::new_v4();
        self.stage = WorkflowStage::Swipe;
        self.tracker.reset();
        self.stats = WorkflowSessionStats::new();
        self.touched_in_stage = false;
        self.advance_pending = false;
        self.classify = None;
        self.trash_selection = Arc::new(BTreeSet::new());
        info!(session = %self.session, "session started");
        self.session
    }

    pub fn session_id(&self) -> SessionId {
        self.session
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn classification_on_swipe(&self) -> bool {
        self.classification_on_swipe
    }

    pub fn sets(&self) -> &SessionOutcomeSets {
        self.tracker.sets()
    }

    pub fn stats(&self) -> &WorkflowSessionStats {
        &self.stats
    }

    pub fn advance_pending(&self) -> bool {
        self.advance_pending
    }

    pub fn classify_queue(&self) -> Option<&ClassifyQueue> {
        self.classify.as_ref()
    }

    pub fn trash_selection(&self) -> &Arc<BTreeSet<PhotoId>> {
        &self.trash_selection
    }

    pub fn unsorted_remaining(&self) -> usize {
        self.unsorted_remaining
    }

    /// Change the classification flag. The stage sequence is recomputed on
    /// the next advance; a session sitting in CLASSIFY finishes it first.
    pub fn set_classification_on_swipe(&mut self, enabled: bool) {
        if self.classification_on_swipe != enabled {
            debug!(session = %self.session, enabled, "classification-on-swipe changed");
            self.classification_on_swipe = enabled;
        }
    }

    pub fn observe_unsorted(&mut self, remaining: usize) {
        self.unsorted_remaining = remaining;
    }

    /// Work left in the current stage.
    pub fn remaining_work(&self) -> usize {
        match self.stage {
            WorkflowStage::Swipe => self.unsorted_remaining,
            WorkflowStage::Compare => self.tracker.maybe().len(),
            WorkflowStage::Classify => self.classify.as_ref().map_or(0, |q| q.remaining()),
            WorkflowStage::Trash => self.tracker.trash().len(),
            WorkflowStage::Victory => 0,
        }
    }

    pub fn has_remaining_work(&self) -> bool {
        self.remaining_work() > 0
    }

    /// Advance if the current stage is done, otherwise ask for confirmation.
    ///
    /// With work remaining this only marks the request as pending; the stage
    /// never changes until `confirm_advance`.
    pub fn request_advance(&mut self) -> AdvanceRequest {
        if self.is_finished() {
            return AdvanceRequest::AlreadyFinished;
        }
        let remaining = self.remaining_work();
        if remaining > 0 {
            self.advance_pending = true;
            info!(session = %self.session, stage = %self.stage, remaining, "advance needs confirmation");
            return AdvanceRequest::ConfirmationRequired {
                stage: self.stage,
                remaining,
            };
        }
        AdvanceRequest::Advanced(self.advance())
    }

    /// Resolve a pending advance by advancing. No-op without one.
    pub fn confirm_advance(&mut self) -> Option<StageTransition> {
        if !self.advance_pending || self.is_finished() {
            self.advance_pending = false;
            return None;
        }
        Some(self.advance())
    }

    /// Drop a pending advance. Returns whether one was pending.
    pub fn cancel_advance(&mut self) -> bool {
        let was_pending = self.advance_pending;
        if was_pending {
            debug!(session = %self.session, stage = %self.stage, "advance cancelled");
        }
        self.advance_pending = false;
        was_pending
    }

    /// Move to the successor stage of the active sequence.
    ///
    /// Entering CLASSIFY materializes the keep list and resets the cursor;
    /// entering TRASH clears the selection; entering VICTORY freezes stats.
    pub fn advance(&mut self) -> StageTransition {
        let from = self.stage;
        let to = stage::next_stage(from, self.classification_on_swipe);
        self.stage = to;
        self.advance_pending = false;
        self.touched_in_stage = false;

        match to {
            WorkflowStage::Classify => {
                self.classify = Some(ClassifyQueue::new(
                    self.tracker.keep().iter().copied().collect(),
                ));
            }
            WorkflowStage::Trash => {
                self.classify = None;
                self.trash_selection = Arc::new(BTreeSet::new());
            }
            WorkflowStage::Victory => {
                self.classify = None;
                self.stats.finish();
            }
            WorkflowStage::Swipe | WorkflowStage::Compare => {}
        }

        info!(session = %self.session, from = %from, to = %to, "stage advanced");
        StageTransition { from, to }
    }

    /// Advance when a mutation in this stage has just emptied its work.
    pub fn check_auto_advance(&mut self) -> Option<StageTransition> {
        if self.is_finished() || !self.touched_in_stage {
            return None;
        }
        let done = match self.stage {
            WorkflowStage::Swipe => self.unsorted_remaining == 0,
            WorkflowStage::Compare => self.tracker.maybe().is_empty(),
            WorkflowStage::Classify => self.classify.as_ref().is_none_or(|q| q.is_done()),
            WorkflowStage::Trash => self.tracker.trash().is_empty(),
            WorkflowStage::Victory => false,
        };
        if !done {
            return None;
        }
        debug!(session = %self.session, stage = %self.stage, "stage work exhausted");
        Some(self.advance())
    }

    /// Like `check_auto_advance`, but also hands back what the advance
    /// replaced so `rewind` can restore it.
    pub fn check_auto_advance_rewindable(&mut self) -> Option<StageRewind> {
        let classify = self.classify.clone();
        let trash_selection = self.trash_selection.clone();
        let stats_frozen = self.stats.is_frozen();
        self.check_auto_advance().map(|transition| StageRewind {
            transition,
            classify,
            trash_selection,
            stats_frozen,
        })
    }

    /// Return to the stage an automatic advance left. Only applies while the
    /// session still sits in the stage the advance entered.
    pub fn rewind(&mut self, rewind: StageRewind) -> bool {
        let StageRewind {
            transition,
            classify,
            trash_selection,
            stats_frozen,
        } = rewind;
        if self.stage != transition.to {
            return false;
        }
        self.stage = transition.from;
        self.classify = classify;
        self.trash_selection = trash_selection;
        if transition.to == WorkflowStage::Victory && !stats_frozen {
            self.stats.reopen();
        }
        self.advance_pending = false;
        self.touched_in_stage = true;
        info!(session = %self.session, from = %transition.to, to = %transition.from, "stage advance undone");
        true
    }

    /// Record a disposition made this session. Returns the session set the
    /// photo was in before, which undo needs to put it back.
    pub fn record_disposition(
        &mut self,
        photo: PhotoId,
        from: Disposition,
        to: Disposition,
    ) -> Option<Disposition> {
        let swiping = self.stage == WorkflowStage::Swipe;
        let prior = self.tracker.record_disposition(photo, to);
        self.stats.record_disposition(from, to, swiping);
        self.touched_in_stage = true;
        debug!(session = %self.session, photo = %photo, from = %from, to = %to, "disposition recorded");
        prior
    }

    /// Reverse `record_disposition` after an undo.
    pub fn revert_disposition(
        &mut self,
        photo: PhotoId,
        previous: Disposition,
        applied: Disposition,
        prior_membership: Option<Disposition>,
    ) {
        self.tracker.undo_disposition(photo, applied);
        if let Some(membership) = prior_membership {
            self.tracker.record_disposition(photo, membership);
        }
        self.stats.revert_disposition(previous, applied);
        self.touched_in_stage = true;
    }

    pub fn record_tagged(&mut self) {
        self.stats.record_tagged();
    }

    pub fn revert_tagged(&mut self) {
        self.stats.revert_tagged();
    }

    /// Photo under the CLASSIFY cursor.
    pub fn classify_current(&self) -> Option<PhotoId> {
        if self.stage != WorkflowStage::Classify {
            return None;
        }
        self.classify.as_ref().and_then(|q| q.current())
    }

    /// Move the cursor past the current photo, counting it as classified or
    /// skipped.
    pub fn classify_step(&mut self, classified: bool) -> Option<PhotoId> {
        let queue = self.classify.as_mut()?;
        let photo = queue.current()?;
        if classified {
            self.stats.record_classified();
        } else {
            queue.skipped.insert(queue.cursor);
            self.stats.record_skipped();
        }
        queue.cursor += 1;
        self.touched_in_stage = true;
        Some(photo)
    }

    /// Put the cursor back on position `index` after the album operation
    /// made there was undone. Skips made past that position are dropped, so
    /// those photos are offered again.
    pub fn classify_rewind_to(&mut self, index: usize) {
        if self.stage != WorkflowStage::Classify {
            return;
        }
        let Some(queue) = self.classify.as_mut() else {
            return;
        };
        if index >= queue.cursor {
            return;
        }
        let dropped = queue.skipped.split_off(&index);
        queue.cursor = index;
        self.stats
            .revert_skipped(u32::try_from(dropped.len()).unwrap_or(u32::MAX));
        self.stats.revert_classified();
        self.touched_in_stage = true;
    }

    /// Flip the selection of a photo in the session trash set.
    pub fn toggle_trash_selection(&mut self, photo: PhotoId) -> bool {
        if !self.tracker.trash().contains(&photo) {
            return false;
        }
        let selection = Arc::make_mut(&mut self.trash_selection);
        if !selection.remove(&photo) {
            selection.insert(photo);
        }
        true
    }

    pub fn select_all_trash(&mut self) {
        self.trash_selection = Arc::new(self.tracker.trash().clone());
    }

    pub fn clear_trash_selection(&mut self) {
        if !self.trash_selection.is_empty() {
            self.trash_selection = Arc::new(BTreeSet::new());
        }
    }

    /// Drop restored or deleted photos from the session trash set and
    /// count them. Clears the selection.
    pub fn remove_from_trash(&mut self, photos: &[PhotoId], reason: TrashRemoval) {
        let mut removed = 0u32;
        for photo in photos {
            if self.tracker.trash().contains(photo) {
                self.tracker.remove(*photo);
                removed += 1;
            }
        }
        match reason {
            TrashRemoval::Restored => self.stats.record_restored(removed),
            TrashRemoval::Deleted => self.stats.record_deleted(removed),
            TrashRemoval::Missing => {
                debug!(session = %self.session, removed, "vanished photos dropped from trash");
            }
        }
        self.trash_selection = Arc::new(BTreeSet::new());
        self.touched_in_stage = true;
    }

    /// Leave the session early: stats freeze, the stage stays where it was.
    pub fn exit(&mut self) {
        self.advance_pending = false;
        self.stats.finish();
        info!(session = %self.session, stage = %self.stage, sorted = self.stats.total_sorted, "session exited");
    }
}
