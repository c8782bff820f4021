//! Undo ledger.
//!
//! The ledger remembers the most recent reversible actions, up to a fixed
//! capacity, and replays the inverse of the newest one on request. The
//! default capacity is one step; raising it turns the ledger into a real
//! stack without changing `record`/`undo`.

pub mod action;

pub use action::UndoableAction;

use photosweep_common::{AlbumId, ArtifactRef, PhotoId, PhotoStatusStore, StoreError};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::classify::{AlbumPaths, TransferKind};

/// Default number of undoable steps.
pub const DEFAULT_CAPACITY: usize = 1;

/// Result of an undo request.
#[derive(Debug)]
pub enum UndoOutcome {
    /// Nothing was recorded; a defined no-op.
    Empty,
    /// The inverse was applied. `warnings` lists album-side failures that were
    /// tolerated because the disposition itself was restored.
    Reverted {
        action: UndoableAction,
        warnings: Vec<StoreError>,
    },
    /// The disposition could not be restored. The action was put back on the
    /// ledger so the undo can be retried.
    Failed {
        action: UndoableAction,
        error: StoreError,
    },
}

impl UndoOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, UndoOutcome::Reverted { .. })
    }

    pub fn action(&self) -> Option<&UndoableAction> {
        match self {
            UndoOutcome::Empty => None,
            UndoOutcome::Reverted { action, .. } | UndoOutcome::Failed { action, .. } => {
                Some(action)
            }
        }
    }
}

/// Bounded record of reversible actions, oldest evicted first.
#[derive(Debug, Clone)]
pub struct ActionLedger {
    entries: VecDeque<UndoableAction>,
    capacity: usize,
}

impl Default for ActionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a ledger holding up to `capacity` actions (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent action, if any.
    pub fn peek(&self) -> Option<&UndoableAction> {
        self.entries.back()
    }

    /// Push an action, dropping the oldest when full.
    pub fn record(&mut self, action: UndoableAction) -> bool {
        if self.entries.len() == self.capacity
            && let Some(evicted) = self.entries.pop_front()
        {
            debug!(photo = %evicted.photo(), kind = evicted.kind_name(), "ledger full, oldest action evicted");
        }
        self.entries.push_back(action);
        true
    }

    /// Forget everything; called when a session starts or is disposed.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Pop the newest action and apply its inverse.
    ///
    /// Album-side failures (an artifact that no longer exists, a move-back
    /// that fails) are reported as warnings and do not stop the disposition
    /// from being restored.
    pub async fn undo(
        &mut self,
        photos: &dyn PhotoStatusStore,
        albums: &AlbumPaths,
    ) -> UndoOutcome {
        let Some(action) = self.entries.pop_back() else {
            return UndoOutcome::Empty;
        };

        match apply_inverse(&action, photos, albums).await {
            Ok(warnings) => {
                info!(
                    photo = %action.photo(),
                    kind = action.kind_name(),
                    restored = %action.previous_disposition(),
                    warnings = warnings.len(),
                    "action undone"
                );
                UndoOutcome::Reverted { action, warnings }
            }
            Err(error) => {
                warn!(photo = %action.photo(), error = %error, "undo could not restore disposition, keeping action");
                self.entries.push_back(action.clone());
                UndoOutcome::Failed { action, error }
            }
        }
    }
}

/// Apply the inverse of `action` without touching any ledger.
///
/// Album-side failures come back as warnings; only a failed disposition
/// restore is an error. Also used to roll back a half-applied compound
/// action.
pub async fn apply_inverse(
    action: &UndoableAction,
    photos: &dyn PhotoStatusStore,
    albums: &AlbumPaths,
) -> Result<Vec<StoreError>, StoreError> {
    let mut warnings = Vec::new();
    let (photo, previous) = match action {
        UndoableAction::StatusChange {
            photo, previous, ..
        } => (*photo, *previous),
        UndoableAction::AlbumOperation {
            photo,
            target_album,
            kind,
            source_album,
            created_artifact,
            previous,
        }
        | UndoableAction::CompoundKeepAndAlbum {
            photo,
            album: target_album,
            kind,
            source_album,
            created_artifact,
            previous,
        } => {
            let reversal = AlbumReversal {
                photo: *photo,
                target_album,
                kind: *kind,
                source_album: source_album.as_ref(),
                created_artifact: created_artifact.as_ref(),
            };
            reversal.apply(photos, albums, &mut warnings).await;
            (*photo, *previous)
        }
    };

    photos.update_disposition(photo, previous).await?;
    Ok(warnings)
}

/// Album half of an inverse, shared by album operations and compound actions.
struct AlbumReversal<'a> {
    photo: PhotoId,
    target_album: &'a AlbumId,
    kind: TransferKind,
    source_album: Option<&'a AlbumId>,
    created_artifact: Option<&'a ArtifactRef>,
}

impl AlbumReversal<'_> {
    async fn apply(
        &self,
        photos: &dyn PhotoStatusStore,
        albums: &AlbumPaths,
        warnings: &mut Vec<StoreError>,
    ) {
        match self.kind {
            TransferKind::Copy => {
                if let Some(artifact) = self.created_artifact
                    && let Err(e) = albums.store().delete_artifact(artifact).await
                {
                    warn!(photo = %self.photo, artifact = %artifact, error = %e, "copied artifact could not be deleted");
                    warnings.push(e);
                }
            }
            TransferKind::Move => match self.source_album {
                Some(source) => {
                    let path = albums.resolve(source).await;
                    if let Err(e) = albums.store().move_photo_to_album(self.photo, &path).await {
                        warn!(photo = %self.photo, source = %source, error = %e, "photo could not be moved back");
                        warnings.push(e);
                    }
                }
                None => {
                    warn!(photo = %self.photo, album = %self.target_album, "moved photo has no source album to return to");
                    warnings.push(StoreError::Rejected(format!(
                        "photo {} had no source album",
                        self.photo
                    )));
                }
            },
        }

        if let Err(e) = photos
            .update_album(self.photo, self.source_album.cloned())
            .await
        {
            warn!(photo = %self.photo, error = %e, "album membership could not be restored");
            warnings.push(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAlbumStore, MemoryPhotoStore};
    use photosweep_common::{Album, AlbumStore, Disposition, PhotoRecord};
    use std::sync::Arc;

    struct Fixture {
        photos: Arc<MemoryPhotoStore>,
        albums: Arc<MemoryAlbumStore>,
        paths: AlbumPaths,
    }

    fn fixture() -> Fixture {
        let photos = Arc::new(MemoryPhotoStore::new(vec![
            PhotoRecord::new(1, "content://1"),
            PhotoRecord::new(2, "content://2").with_disposition(Disposition::Maybe),
            PhotoRecord::new(3, "content://3")
                .with_disposition(Disposition::Keep)
                .in_album(AlbumId::new("camera")),
        ]));
        let albums = Arc::new(MemoryAlbumStore::new(vec![
            Album::new("camera", "Camera"),
            Album::new("trips", "Trips"),
        ]));
        let paths = AlbumPaths::new(albums.clone(), "Pictures");
        Fixture {
            photos,
            albums,
            paths,
        }
    }

    fn status_change(photo: i64, previous: Disposition, new: Disposition) -> UndoableAction {
        UndoableAction::StatusChange {
            photo: PhotoId(photo),
            previous,
            new,
        }
    }

    async fn disposition_of(store: &MemoryPhotoStore, id: i64) -> Disposition {
        store.get_photo(PhotoId(id)).await.unwrap().unwrap().disposition
    }

    #[tokio::test]
    async fn test_undo_on_empty_ledger_is_noop() {
        let f = fixture();
        let mut ledger = ActionLedger::new();
        let outcome = ledger.undo(f.photos.as_ref(), &f.paths).await;
        assert!(matches!(outcome, UndoOutcome::Empty));
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_status_change_restores_previous_value() {
        let f = fixture();
        let mut ledger = ActionLedger::new();

        f.photos
            .update_disposition(PhotoId(2), Disposition::Trash)
            .await
            .unwrap();
        ledger.record(status_change(2, Disposition::Maybe, Disposition::Trash));

        let outcome = ledger.undo(f.photos.as_ref(), &f.paths).await;
        assert!(outcome.succeeded());
        assert_eq!(disposition_of(&f.photos, 2).await, Disposition::Maybe);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_single_step_bound_undoes_only_latest() {
        let f = fixture();
        let mut ledger = ActionLedger::new();

        f.photos
            .update_disposition(PhotoId(1), Disposition::Keep)
            .await
            .unwrap();
        ledger.record(status_change(1, Disposition::Unsorted, Disposition::Keep));
        f.photos
            .update_disposition(PhotoId(2), Disposition::Trash)
            .await
            .unwrap();
        ledger.record(status_change(2, Disposition::Maybe, Disposition::Trash));
        assert_eq!(ledger.len(), 1);

        assert!(ledger.undo(f.photos.as_ref(), &f.paths).await.succeeded());
        assert!(!ledger.undo(f.photos.as_ref(), &f.paths).await.succeeded());

        assert_eq!(disposition_of(&f.photos, 2).await, Disposition::Maybe);
        assert_eq!(disposition_of(&f.photos, 1).await, Disposition::Keep);
    }

    #[tokio::test]
    async fn test_larger_capacity_evicts_oldest_first() {
        let f = fixture();
        let mut ledger = ActionLedger::with_capacity(2);
        ledger.record(status_change(1, Disposition::Unsorted, Disposition::Keep));
        ledger.record(status_change(2, Disposition::Maybe, Disposition::Trash));
        ledger.record(status_change(3, Disposition::Keep, Disposition::Trash));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.peek().map(|a| a.photo()), Some(PhotoId(3)));

        ledger.undo(f.photos.as_ref(), &f.paths).await;
        let second = ledger.undo(f.photos.as_ref(), &f.paths).await;
        assert_eq!(second.action().map(|a| a.photo()), Some(PhotoId(2)));
        assert!(matches!(
            ledger.undo(f.photos.as_ref(), &f.paths).await,
            UndoOutcome::Empty
        ));
    }

    #[tokio::test]
    async fn test_copy_undo_deletes_artifact_and_membership() {
        let f = fixture();
        let mut ledger = ActionLedger::new();
        let artifact = f
            .albums
            .copy_photo_to_album(PhotoId(1), "Pictures/Trips")
            .await
            .unwrap();
        f.photos
            .update_album(PhotoId(1), Some(AlbumId::new("trips")))
            .await
            .unwrap();
        f.photos
            .update_disposition(PhotoId(1), Disposition::Keep)
            .await
            .unwrap();
        ledger.record(UndoableAction::CompoundKeepAndAlbum {
            photo: PhotoId(1),
            album: AlbumId::new("trips"),
            previous: Disposition::Unsorted,
            kind: TransferKind::Copy,
            source_album: None,
            created_artifact: Some(artifact.clone()),
        });

        let outcome = ledger.undo(f.photos.as_ref(), &f.paths).await;

        assert!(outcome.succeeded());
        assert!(!f.albums.artifact_exists(&artifact));
        let record = f.photos.get_photo(PhotoId(1)).await.unwrap().unwrap();
        assert_eq!(record.album, None);
        assert_eq!(record.disposition, Disposition::Unsorted);
    }

    #[tokio::test]
    async fn test_move_undo_returns_photo_to_source_album() {
        let f = fixture();
        f.albums.set_album_path(AlbumId::new("camera"), "DCIM/Camera");
        let mut ledger = ActionLedger::new();
        f.albums
            .move_photo_to_album(PhotoId(3), "Pictures/Trips")
            .await
            .unwrap();
        f.photos
            .update_album(PhotoId(3), Some(AlbumId::new("trips")))
            .await
            .unwrap();
        ledger.record(UndoableAction::AlbumOperation {
            photo: PhotoId(3),
            target_album: AlbumId::new("trips"),
            kind: TransferKind::Move,
            source_album: Some(AlbumId::new("camera")),
            created_artifact: None,
            previous: Disposition::Keep,
        });

        let outcome = ledger.undo(f.photos.as_ref(), &f.paths).await;

        assert!(outcome.succeeded());
        assert_eq!(f.albums.location_of(PhotoId(3)).as_deref(), Some("DCIM/Camera"));
        let record = f.photos.get_photo(PhotoId(3)).await.unwrap().unwrap();
        assert_eq!(record.album, Some(AlbumId::new("camera")));
        assert_eq!(record.disposition, Disposition::Keep);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_tolerated() {
        let f = fixture();
        let mut ledger = ActionLedger::new();
        f.photos
            .update_disposition(PhotoId(1), Disposition::Keep)
            .await
            .unwrap();
        ledger.record(UndoableAction::CompoundKeepAndAlbum {
            photo: PhotoId(1),
            album: AlbumId::new("trips"),
            previous: Disposition::Unsorted,
            kind: TransferKind::Copy,
            source_album: None,
            created_artifact: Some(ArtifactRef("gone".into())),
        });

        let outcome = ledger.undo(f.photos.as_ref(), &f.paths).await;

        match outcome {
            UndoOutcome::Reverted { warnings, .. } => {
                assert_eq!(warnings.len(), 1);
                assert!(matches!(warnings[0], StoreError::ArtifactMissing(_)));
            }
            other => panic!("Expected Reverted, got {:?}", other),
        }
        assert_eq!(disposition_of(&f.photos, 1).await, Disposition::Unsorted);
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_action_for_retry() {
        let f = fixture();
        let mut ledger = ActionLedger::new();
        ledger.record(status_change(1, Disposition::Unsorted, Disposition::Trash));
        f.photos.fail_updates_for(PhotoId(1));

        let outcome = ledger.undo(f.photos.as_ref(), &f.paths).await;

        assert!(matches!(outcome, UndoOutcome::Failed { .. }));
        assert_eq!(ledger.len(), 1);
    }
}
