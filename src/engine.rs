//! The workflow engine: state machine, session tracking, undo and the two
//! coordinators wired to the collaborators.
//!
//! All mutation goes through `&mut WorkflowEngine`, which the owner task
//! holds exclusively. After every operation a fresh `EngineState` is
//! published on a `watch` channel; readers never see a half-applied change.

use photosweep_common::{
    AlbumId, AlbumStore, ConfirmationHandle, Disposition, FilterMode, MediaDeleter, PhotoId,
    PhotoRecord, PhotoStatusStore, Preferences,
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::aggregate::{self, ReactiveAggregator};
use crate::classify::{ClassifyCoordinator, TransferKind};
use crate::cleanup::{BatchOutcome, CleanupCoordinator, DeleteRequest, PendingDelete};
use crate::errors::WorkflowError;
use crate::ledger::{self, ActionLedger, UndoOutcome, UndoableAction};
use crate::session::DailyTally;
use crate::stage::WorkflowStage;
use crate::workflow::{
    AdvanceRequest, SessionId, StageRewind, StageTransition, TrashRemoval, WorkflowStateMachine,
};

/// How a session was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    #[default]
    Standard,
    /// Swipe only up to the day's quota
    DailyTask,
}

impl fmt::Display for LaunchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchMode::Standard => write!(f, "standard"),
            LaunchMode::DailyTask => write!(f, "daily_task"),
        }
    }
}

/// Settings the engine is built with.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub ledger_capacity: usize,
    pub transfer: TransferKind,
    pub album_root: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            ledger_capacity: ledger::DEFAULT_CAPACITY,
            transfer: TransferKind::default(),
            album_root: "Pictures".to_string(),
        }
    }
}

/// The external collaborators the engine drives.
#[derive(Clone)]
pub struct Collaborators {
    pub photos: Arc<dyn PhotoStatusStore>,
    pub albums: Arc<dyn AlbumStore>,
    pub deleter: Arc<dyn MediaDeleter>,
    pub preferences: Arc<dyn Preferences>,
}

/// Everything observers need about the engine, published after each change.
#[derive(Debug, Clone)]
pub struct EngineState {
    /// Increases with every publish
    pub revision: u64,
    pub machine: WorkflowStateMachine,
    pub launch_mode: LaunchMode,
    /// First-time sorts today across sessions, the current one included
    pub sorted_today: u32,
    pub can_undo: bool,
    pub pending_delete: Option<ConfirmationHandle>,
    pub last_batch: Option<BatchOutcome>,
}

/// Source receivers the owner task waits on besides its command channel.
pub struct SourceWatch {
    pub unsorted: watch::Receiver<Arc<Vec<PhotoRecord>>>,
    pub filter_mode: watch::Receiver<FilterMode>,
    pub classification_on_swipe: watch::Receiver<bool>,
    pub daily_task_target: watch::Receiver<u32>,
}

/// Machine-side facts an undo needs besides the ledger entry itself.
#[derive(Debug, Default)]
struct UndoContext {
    /// Session set the photo was in before the action
    prior_membership: Option<Disposition>,
    /// CLASSIFY cursor position the action was made at
    classify_cursor: Option<usize>,
    /// Stage advance the action triggered
    rewind: Option<StageRewind>,
}

pub struct WorkflowEngine {
    collaborators: Collaborators,
    classify: ClassifyCoordinator,
    cleanup: CleanupCoordinator,
    ledger: ActionLedger,
    /// One context per ledger entry, kept in step with the ledger
    undo_trail: VecDeque<UndoContext>,
    machine: WorkflowStateMachine,
    launch_mode: LaunchMode,
    daily_tally: DailyTally,
    pending_delete: Option<PendingDelete>,
    last_batch: Option<BatchOutcome>,
    sources: SourceWatch,
    revision: u64,
    state_tx: watch::Sender<EngineState>,
}

impl WorkflowEngine {
    pub fn new(collaborators: Collaborators, options: EngineOptions) -> Self {
        let sources = SourceWatch {
            unsorted: collaborators
                .photos
                .photos_by_disposition(Disposition::Unsorted),
            filter_mode: collaborators.preferences.filter_mode(),
            classification_on_swipe: collaborators.preferences.classification_on_swipe(),
            daily_task_target: collaborators.preferences.daily_task_target(),
        };
        let machine = WorkflowStateMachine::new(*sources.classification_on_swipe.borrow());
        let classify = ClassifyCoordinator::new(
            collaborators.photos.clone(),
            collaborators.albums.clone(),
            options.transfer,
            options.album_root,
        );
        let cleanup =
            CleanupCoordinator::new(collaborators.photos.clone(), collaborators.deleter.clone());
        let ledger = ActionLedger::with_capacity(options.ledger_capacity);

        let initial = EngineState {
            revision: 0,
            machine: machine.clone(),
            launch_mode: LaunchMode::Standard,
            sorted_today: 0,
            can_undo: false,
            pending_delete: None,
            last_batch: None,
        };
        let (state_tx, _) = watch::channel(initial);

        let mut engine = Self {
            collaborators,
            classify,
            cleanup,
            ledger,
            undo_trail: VecDeque::new(),
            machine,
            launch_mode: LaunchMode::Standard,
            daily_tally: DailyTally::new(today()),
            pending_delete: None,
            last_batch: None,
            sources,
            revision: 0,
            state_tx,
        };
        engine.refresh_sources();
        engine.publish();
        engine
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.state_tx.borrow().clone()
    }

    pub fn machine(&self) -> &WorkflowStateMachine {
        &self.machine
    }

    pub fn ledger(&self) -> &ActionLedger {
        &self.ledger
    }

    /// Fresh receivers on the sources that can change remaining work.
    pub fn source_watch(&self) -> SourceWatch {
        SourceWatch {
            unsorted: self.sources.unsorted.clone(),
            filter_mode: self.sources.filter_mode.clone(),
            classification_on_swipe: self.sources.classification_on_swipe.clone(),
            daily_task_target: self.sources.daily_task_target.clone(),
        }
    }

    /// Spawn an aggregator fed by this engine and its collaborators.
    pub fn aggregator(&self) -> ReactiveAggregator {
        ReactiveAggregator::spawn(
            self.subscribe(),
            self.collaborators.photos.as_ref(),
            self.collaborators.albums.as_ref(),
            self.collaborators.preferences.as_ref(),
        )
    }

    pub fn start(&mut self, mode: LaunchMode) -> SessionId {
        if let Some(pending) = self.pending_delete.take() {
            debug!(session = %pending.session, "dropping delete confirmation of previous session");
        }
        self.ledger.clear();
        self.undo_trail.clear();
        self.last_batch = None;
        self.launch_mode = mode;
        self.daily_tally
            .carry(today(), self.machine.stats().total_sorted);
        let session = self.machine.start();
        info!(session = %session, mode = %mode, "sorting session launched");
        self.refresh_sources();
        self.publish();
        session
    }

    /// Assign a disposition to a photo in the SWIPE stage.
    pub async fn swipe(
        &mut self,
        photo: PhotoId,
        decision: Disposition,
    ) -> Result<(), WorkflowError> {
        self.require_stage(WorkflowStage::Swipe)?;
        self.apply_status_change(photo, decision).await
    }

    /// Keep a photo and file it into an album in one swipe.
    pub async fn swipe_keep_to_album(
        &mut self,
        photo: PhotoId,
        album: AlbumId,
    ) -> Result<(), WorkflowError> {
        self.require_stage(WorkflowStage::Swipe)?;
        self.require_album(&album)?;
        let record = self.fetch(photo).await?;
        let previous = record.disposition;

        let assignment = self.classify.assign(&record, &album).await?;
        let action = assignment.into_compound(previous);

        if let Err(e) = self
            .collaborators
            .photos
            .update_disposition(photo, Disposition::Keep)
            .await
        {
            warn!(photo = %photo, error = %e, "keep failed after album transfer, rolling back");
            if let Err(rollback) = ledger::apply_inverse(
                &action,
                self.collaborators.photos.as_ref(),
                self.classify.paths(),
            )
            .await
            {
                warn!(photo = %photo, error = %rollback, "rollback of album transfer failed");
            }
            return Err(e.into());
        }

        let prior = self
            .machine
            .record_disposition(photo, previous, Disposition::Keep);
        self.machine.record_tagged();
        self.record_action(
            action,
            UndoContext {
                prior_membership: prior,
                ..UndoContext::default()
            },
        );
        self.after_recorded_mutation();
        Ok(())
    }

    /// Resolve a deferred photo in the COMPARE stage.
    pub async fn resolve_maybe(
        &mut self,
        photo: PhotoId,
        disposition: Disposition,
    ) -> Result<(), WorkflowError> {
        self.require_stage(WorkflowStage::Compare)?;
        if !self.machine.sets().maybe.contains(&photo) {
            return Err(WorkflowError::PhotoNotFound { id: photo });
        }
        self.apply_status_change(photo, disposition).await
    }

    pub fn request_advance(&mut self) -> AdvanceRequest {
        self.refresh_sources();
        let request = self.machine.request_advance();
        if let AdvanceRequest::Advanced(transition) = request {
            self.on_stage_change(transition);
        }
        self.publish();
        request
    }

    pub fn confirm_advance(&mut self) -> Option<StageTransition> {
        let transition = self.machine.confirm_advance();
        if let Some(transition) = transition {
            self.on_stage_change(transition);
        }
        self.publish();
        transition
    }

    pub fn cancel_advance(&mut self) -> bool {
        let cancelled = self.machine.cancel_advance();
        self.publish();
        cancelled
    }

    /// Undo the most recent action. `Ok(false)` when there is nothing to undo.
    ///
    /// When the action finished its stage and the session moved on by
    /// itself, the session returns to that stage as well.
    pub async fn undo(&mut self) -> Result<bool, WorkflowError> {
        let outcome = self
            .ledger
            .undo(self.collaborators.photos.as_ref(), self.classify.paths())
            .await;

        match outcome {
            UndoOutcome::Empty => {
                debug!("undo requested with empty ledger");
                Ok(false)
            }
            UndoOutcome::Failed { error, .. } => Err(error.into()),
            UndoOutcome::Reverted { action, warnings } => {
                let context = self.undo_trail.pop_back().unwrap_or_default();
                let prior = context.prior_membership;
                if !warnings.is_empty() {
                    warn!(photo = %action.photo(), count = warnings.len(), "undo completed with album-side failures");
                }
                if let Some(rewind) = context.rewind {
                    let transition = rewind.transition;
                    if !self.machine.rewind(rewind) {
                        warn!(from = %transition.from, to = %transition.to, stage = %self.machine.stage(), "stage advance could not be undone");
                    }
                }
                match action {
                    UndoableAction::StatusChange {
                        photo,
                        previous,
                        new,
                    } => {
                        self.machine
                            .revert_disposition(photo, previous, new, prior);
                    }
                    UndoableAction::AlbumOperation { .. } => {
                        if let Some(index) = context.classify_cursor {
                            self.machine.classify_rewind_to(index);
                        }
                    }
                    UndoableAction::CompoundKeepAndAlbum {
                        photo, previous, ..
                    } => {
                        self.machine
                            .revert_disposition(photo, previous, Disposition::Keep, prior);
                        self.machine.revert_tagged();
                    }
                }
                self.settle();
                Ok(true)
            }
        }
    }

    /// File the photo under the CLASSIFY cursor into `album`.
    pub async fn classify_current_to_album(
        &mut self,
        album: AlbumId,
    ) -> Result<PhotoId, WorkflowError> {
        self.require_stage(WorkflowStage::Classify)?;
        let photo = self
            .machine
            .classify_current()
            .ok_or(WorkflowError::NothingToClassify)?;
        self.require_album(&album)?;
        let record = self.fetch(photo).await?;

        let assignment = self.classify.assign(&record, &album).await?;
        let cursor = self.machine.classify_queue().map(|q| q.cursor);
        self.record_action(
            assignment.into_action(record.disposition),
            UndoContext {
                classify_cursor: cursor,
                ..UndoContext::default()
            },
        );
        self.machine.classify_step(true);
        self.after_recorded_mutation();
        Ok(photo)
    }

    /// Move past the photo under the CLASSIFY cursor without filing it.
    pub fn skip_classify(&mut self) -> Result<PhotoId, WorkflowError> {
        self.require_stage(WorkflowStage::Classify)?;
        let photo = self
            .machine
            .classify_step(false)
            .ok_or(WorkflowError::NothingToClassify)?;
        debug!(photo = %photo, "classification skipped");
        self.after_mutation();
        Ok(photo)
    }

    pub fn toggle_trash_selection(&mut self, photo: PhotoId) -> Result<bool, WorkflowError> {
        self.require_stage(WorkflowStage::Trash)?;
        let toggled = self.machine.toggle_trash_selection(photo);
        self.publish();
        Ok(toggled)
    }

    pub fn select_all_trash(&mut self) -> Result<(), WorkflowError> {
        self.require_stage(WorkflowStage::Trash)?;
        self.machine.select_all_trash();
        self.publish();
        Ok(())
    }

    pub fn clear_trash_selection(&mut self) -> Result<(), WorkflowError> {
        self.require_stage(WorkflowStage::Trash)?;
        self.machine.clear_trash_selection();
        self.publish();
        Ok(())
    }

    /// Restore the selected trash photos to KEEP or MAYBE.
    pub async fn restore_selected(
        &mut self,
        target: Disposition,
    ) -> Result<BatchOutcome, WorkflowError> {
        self.require_stage(WorkflowStage::Trash)?;
        if !matches!(target, Disposition::Keep | Disposition::Maybe) {
            return Err(WorkflowError::InvalidRestoreTarget {
                disposition: target,
            });
        }
        let selected: Vec<PhotoId> = self.machine.trash_selection().iter().copied().collect();
        if selected.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let outcome = self.cleanup.restore(&selected, target).await;
        self.machine
            .remove_from_trash(&outcome.succeeded, TrashRemoval::Restored);
        self.last_batch = Some(outcome.clone());
        self.after_mutation();
        Ok(outcome)
    }

    /// Permanently delete the selected trash photos, or the whole session
    /// trash set when nothing is selected.
    pub async fn request_permanent_delete(&mut self) -> Result<DeleteRequest, WorkflowError> {
        self.require_stage(WorkflowStage::Trash)?;
        let selection = self.machine.trash_selection();
        let ids: Vec<PhotoId> = if selection.is_empty() {
            self.machine.sets().trash.iter().copied().collect()
        } else {
            selection.iter().copied().collect()
        };

        // A failed lookup is reported per photo like any other batch failure;
        // a photo whose record is gone has nothing left to delete.
        let mut lookup = BatchOutcome::default();
        let mut missing = Vec::new();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.collaborators.photos.get_photo(id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    warn!(photo = %id, "trashed photo no longer in store, dropping it");
                    missing.push(id);
                }
                Err(e) => {
                    warn!(photo = %id, error = %e, "lookup of trashed photo failed");
                    lookup.fail(id, &e);
                }
            }
        }
        if !missing.is_empty() {
            self.machine
                .remove_from_trash(&missing, TrashRemoval::Missing);
        }
        if records.is_empty() {
            self.last_batch = Some(lookup.clone());
            self.after_mutation();
            return Ok(DeleteRequest::Completed(lookup));
        }

        let request = self
            .cleanup
            .request_delete(self.machine.session_id(), &records)
            .await?;
        match request {
            DeleteRequest::AwaitingConfirmation(pending) => {
                self.pending_delete = Some(pending.clone());
                if lookup.has_failures() {
                    self.last_batch = Some(lookup);
                }
                if missing.is_empty() {
                    self.publish();
                } else {
                    self.after_mutation();
                }
                Ok(DeleteRequest::AwaitingConfirmation(pending))
            }
            DeleteRequest::Completed(mut outcome) => {
                outcome.merge(lookup);
                self.machine
                    .remove_from_trash(&outcome.succeeded, TrashRemoval::Deleted);
                self.last_batch = Some(outcome.clone());
                self.after_mutation();
                Ok(DeleteRequest::Completed(outcome))
            }
        }
    }

    /// Deliver the user's answer to a pending delete confirmation.
    ///
    /// A declined confirmation changes nothing. A token from another request
    /// or a confirmation left over from an earlier session is rejected.
    pub async fn confirm_delete(
        &mut self,
        token: Option<&str>,
        confirmed: bool,
    ) -> Result<Option<BatchOutcome>, WorkflowError> {
        let pending = self
            .pending_delete
            .take()
            .ok_or(WorkflowError::NoPendingDelete)?;

        if pending.session != self.machine.session_id() {
            warn!(stale = %pending.session, current = %self.machine.session_id(), "stale delete confirmation dropped");
            self.publish();
            return Err(WorkflowError::StaleConfirmation);
        }
        if let Some(token) = token
            && token != pending.handle.token
        {
            warn!(expected = %pending.handle.token, got = token, "delete confirmation token mismatch");
            self.pending_delete = Some(pending);
            return Err(WorkflowError::StaleConfirmation);
        }

        if !confirmed {
            info!(count = pending.photos.len(), "permanent delete declined");
            self.publish();
            return Ok(None);
        }

        let outcome = self.cleanup.complete_confirmed(&pending).await;
        self.machine
            .remove_from_trash(&outcome.succeeded, TrashRemoval::Deleted);
        self.last_batch = Some(outcome.clone());
        self.after_mutation();
        Ok(Some(outcome))
    }

    /// Leave the session before VICTORY.
    pub fn exit(&mut self) {
        self.pending_delete = None;
        self.machine.exit();
        self.publish();
    }

    /// Tear the session down: no pending work, empty ledger, fresh machine.
    pub fn dispose(&mut self) {
        self.pending_delete = None;
        self.ledger.clear();
        self.undo_trail.clear();
        self.last_batch = None;
        self.daily_tally
            .carry(today(), self.machine.stats().total_sorted);
        self.machine = WorkflowStateMachine::new(self.machine.classification_on_swipe());
        self.refresh_sources();
        self.publish();
        debug!("engine disposed");
    }

    /// Re-read the preference and unsorted sources after one of them changed.
    pub fn on_sources_changed(&mut self) {
        self.refresh_sources();
        if let Some(transition) = self.machine.check_auto_advance() {
            self.on_stage_change(transition);
        }
        self.publish();
    }

    async fn apply_status_change(
        &mut self,
        photo: PhotoId,
        disposition: Disposition,
    ) -> Result<(), WorkflowError> {
        let record = self.fetch(photo).await?;
        let previous = record.disposition;
        self.collaborators
            .photos
            .update_disposition(photo, disposition)
            .await?;

        let prior = self
            .machine
            .record_disposition(photo, previous, disposition);
        self.record_action(
            UndoableAction::StatusChange {
                photo,
                previous,
                new: disposition,
            },
            UndoContext {
                prior_membership: prior,
                ..UndoContext::default()
            },
        );
        self.after_recorded_mutation();
        Ok(())
    }

    fn record_action(&mut self, action: UndoableAction, context: UndoContext) {
        if self.undo_trail.len() == self.ledger.capacity() {
            self.undo_trail.pop_front();
        }
        self.undo_trail.push_back(context);
        self.ledger.record(action);
    }

    async fn fetch(&self, photo: PhotoId) -> Result<PhotoRecord, WorkflowError> {
        self.collaborators
            .photos
            .get_photo(photo)
            .await?
            .ok_or(WorkflowError::PhotoNotFound { id: photo })
    }

    fn require_stage(&self, expected: WorkflowStage) -> Result<(), WorkflowError> {
        let actual = self.machine.stage();
        if actual != expected {
            return Err(WorkflowError::WrongStage { expected, actual });
        }
        Ok(())
    }

    fn require_album(&self, album: &AlbumId) -> Result<(), WorkflowError> {
        if self.classify.paths().album(album).is_none() {
            return Err(WorkflowError::UnknownAlbum { id: album.clone() });
        }
        Ok(())
    }

    fn refresh_sources(&mut self) {
        let flag = *self.sources.classification_on_swipe.borrow_and_update();
        self.machine.set_classification_on_swipe(flag);

        let filter = self.sources.filter_mode.borrow_and_update().clone();
        let target = *self.sources.daily_task_target.borrow_and_update();
        let daily = aggregate::daily_status(self.launch_mode, target, self.sorted_today());
        let pool = aggregate::swipe_pool(&self.sources.unsorted.borrow_and_update(), &filter);
        self.machine
            .observe_unsorted(aggregate::swipe_remaining(pool.len(), daily));
    }

    fn sorted_today(&self) -> u32 {
        self.daily_tally
            .carried(today())
            .saturating_add(self.machine.stats().total_sorted)
    }

    /// Settle after a mutation the ledger does not record. Undo cannot
    /// reach back across an automatic advance once the new stage has
    /// changed underneath it.
    fn after_mutation(&mut self) {
        if self.undo_trail.iter().any(|c| c.rewind.is_some()) {
            self.ledger.clear();
            self.undo_trail.clear();
            debug!(stage = %self.machine.stage(), "ledger cleared by unrecorded change in new stage");
        }
        self.settle();
    }

    /// Settle after a recorded action. An advance it triggers stays
    /// undoable together with the action.
    fn after_recorded_mutation(&mut self) {
        self.refresh_sources();
        if let Some(rewind) = self.machine.check_auto_advance_rewindable() {
            self.pending_delete = None;
            debug!(from = %rewind.transition.from, to = %rewind.transition.to, "stage finished by last action");
            if let Some(context) = self.undo_trail.back_mut() {
                context.rewind = Some(rewind);
            }
        }
        self.publish();
    }

    fn settle(&mut self) {
        self.refresh_sources();
        if let Some(transition) = self.machine.check_auto_advance() {
            self.on_stage_change(transition);
        }
        self.publish();
    }

    fn on_stage_change(&mut self, transition: StageTransition) {
        self.ledger.clear();
        self.undo_trail.clear();
        self.pending_delete = None;
        debug!(from = %transition.from, to = %transition.to, "ledger cleared on stage change");
    }

    fn publish(&mut self) {
        self.revision += 1;
        let state = EngineState {
            revision: self.revision,
            machine: self.machine.clone(),
            launch_mode: self.launch_mode,
            sorted_today: self.sorted_today(),
            can_undo: !self.ledger.is_empty(),
            pending_delete: self.pending_delete.as_ref().map(|p| p.handle.clone()),
            last_batch: self.last_batch.clone(),
        };
        self.state_tx.send_replace(state);
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
