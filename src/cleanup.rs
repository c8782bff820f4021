//! TRASH-stage cleanup: restoring and permanently deleting photos.
//!
//! Every item of a batch is attempted on its own; a failure is recorded
//! next to the successes and never rolls them back.

use futures::future::join_all;
use photosweep_common::{
    ConfirmationHandle, Disposition, MediaDeleter, PhotoId, PhotoRecord, PhotoStatusStore,
    StoreError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-item result of a batch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<PhotoId>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub photo: PhotoId,
    pub error: String,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Record a photo that could not be attempted at all.
    pub fn fail(&mut self, photo: PhotoId, error: &StoreError) {
        self.failed.push(BatchFailure {
            photo,
            error: error.to_string(),
        });
    }

    /// Fold the items of `other` into this outcome.
    pub fn merge(&mut self, other: BatchOutcome) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }

    fn push(&mut self, photo: PhotoId, result: Result<(), StoreError>) {
        match result {
            Ok(()) => self.succeeded.push(photo),
            Err(e) => self.failed.push(BatchFailure {
                photo,
                error: e.to_string(),
            }),
        }
    }
}

/// A permanent delete waiting for the user's answer to the system prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelete {
    /// Session that issued the request
    pub session: Uuid,
    pub photos: Vec<PhotoId>,
    pub handle: ConfirmationHandle,
}

/// Result of asking for a permanent delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRequest {
    /// The platform needs the user to confirm first.
    AwaitingConfirmation(PendingDelete),
    /// Deleted right away.
    Completed(BatchOutcome),
}

/// Drives restore and permanent-delete batches against the collaborators.
pub struct CleanupCoordinator {
    photos: Arc<dyn PhotoStatusStore>,
    deleter: Arc<dyn MediaDeleter>,
}

impl CleanupCoordinator {
    pub fn new(photos: Arc<dyn PhotoStatusStore>, deleter: Arc<dyn MediaDeleter>) -> Self {
        Self { photos, deleter }
    }

    /// Set every photo to `target`, independently.
    pub async fn restore(&self, ids: &[PhotoId], target: Disposition) -> BatchOutcome {
        let results = join_all(
            ids.iter()
                .map(|id| self.photos.update_disposition(*id, target)),
        )
        .await;

        let mut outcome = BatchOutcome::default();
        for (id, result) in ids.iter().zip(results) {
            outcome.push(*id, result);
        }
        if outcome.has_failures() {
            warn!(restored = outcome.success_count(), failed = outcome.failed.len(), target = %target, "restore finished with failures");
        } else {
            info!(restored = outcome.success_count(), target = %target, "photos restored from trash");
        }
        outcome
    }

    /// Start a permanent delete of `records`.
    ///
    /// Where the platform requires confirmation, only a handle is obtained
    /// and nothing is deleted yet. Otherwise media and records are deleted
    /// immediately, item by item.
    pub async fn request_delete(
        &self,
        session: Uuid,
        records: &[PhotoRecord],
    ) -> Result<DeleteRequest, StoreError> {
        if self.deleter.requires_confirmation() {
            let uris: Vec<String> = records.iter().map(|r| r.uri.clone()).collect();
            let handle = self.deleter.request_delete_confirmation(&uris).await?;
            info!(count = records.len(), token = %handle.token, "permanent delete awaiting confirmation");
            return Ok(DeleteRequest::AwaitingConfirmation(PendingDelete {
                session,
                photos: records.iter().map(|r| r.id).collect(),
                handle,
            }));
        }

        let results = join_all(records.iter().map(|record| async move {
            self.deleter.delete_media(&record.uri).await?;
            self.photos.delete_record(record.id).await
        }))
        .await;

        let mut outcome = BatchOutcome::default();
        for (record, result) in records.iter().zip(results) {
            outcome.push(record.id, result);
        }
        log_deletion(&outcome);
        Ok(DeleteRequest::Completed(outcome))
    }

    /// Finish a confirmed delete. The platform already removed the media,
    /// so only the records are dropped.
    pub async fn complete_confirmed(&self, pending: &PendingDelete) -> BatchOutcome {
        let results = join_all(
            pending
                .photos
                .iter()
                .map(|id| self.photos.delete_record(*id)),
        )
        .await;

        let mut outcome = BatchOutcome::default();
        for (id, result) in pending.photos.iter().zip(results) {
            outcome.push(*id, result);
        }
        log_deletion(&outcome);
        outcome
    }
}

fn log_deletion(outcome: &BatchOutcome) {
    if outcome.has_failures() {
        warn!(deleted = outcome.success_count(), failed = outcome.failed.len(), "permanent delete finished with failures");
    } else {
        info!(deleted = outcome.success_count(), "photos permanently deleted");
    }
}
