//! Album assignment for kept photos.
//!
//! The CLASSIFY stage walks a cursor over the photos kept this session and
//! files each one into an album. The same transfer is used when albums are
//! assigned directly while swiping. This module performs the album side of
//! that work; the cursor itself lives in the state machine.

use photosweep_common::{
    Album, AlbumId, AlbumStore, ArtifactRef, Disposition, PhotoId, PhotoRecord,
    PhotoStatusStore,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::errors::ClassifyError;
use crate::ledger::UndoableAction;

/// How a photo is placed into an album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    /// Leave the original in place and create a copy in the album
    #[default]
    Copy,
    /// Relocate the original into the album
    Move,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Copy => write!(f, "copy"),
            TransferKind::Move => write!(f, "move"),
        }
    }
}

impl std::str::FromStr for TransferKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "copy" => Ok(TransferKind::Copy),
            "move" => Ok(TransferKind::Move),
            _ => anyhow::bail!("Invalid transfer kind '{}'. Valid values: copy, move", s),
        }
    }
}

/// Path used for an album the backend cannot resolve, derived from its name.
pub fn fallback_album_path(root: &str, name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let cleaned = if cleaned.is_empty() {
        "Album".to_string()
    } else {
        cleaned
    };
    format!("{}/{}", root.trim_end_matches('/'), cleaned)
}

/// Resolves album ids to destination paths, with a name-derived fallback.
pub struct AlbumPaths {
    store: Arc<dyn AlbumStore>,
    albums: watch::Receiver<Arc<Vec<Album>>>,
    root: String,
}

impl AlbumPaths {
    pub fn new(store: Arc<dyn AlbumStore>, root: impl Into<String>) -> Self {
        let albums = store.list_albums();
        Self {
            store,
            albums,
            root: root.into(),
        }
    }

    pub fn store(&self) -> &dyn AlbumStore {
        self.store.as_ref()
    }

    /// Look up an album in the latest album list.
    pub fn album(&self, id: &AlbumId) -> Option<Album> {
        self.albums.borrow().iter().find(|a| &a.id == id).cloned()
    }

    pub async fn resolve(&self, id: &AlbumId) -> String {
        if let Some(path) = self.store.resolve_album_path(id).await {
            return path;
        }
        let name = self
            .album(id)
            .map(|a| a.name)
            .unwrap_or_else(|| id.to_string());
        let path = fallback_album_path(&self.root, &name);
        debug!(album = %id, path = %path, "album path not resolvable, using name-derived default");
        path
    }
}

/// Outcome of one successful album transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumAssignment {
    pub photo: PhotoId,
    pub album: AlbumId,
    pub kind: TransferKind,
    pub source_album: Option<AlbumId>,
    pub artifact: Option<ArtifactRef>,
}

impl AlbumAssignment {
    /// Ledger entry for an assignment made in the CLASSIFY stage.
    pub fn into_action(self, previous: Disposition) -> UndoableAction {
        UndoableAction::AlbumOperation {
            photo: self.photo,
            target_album: self.album,
            kind: self.kind,
            source_album: self.source_album,
            created_artifact: self.artifact,
            previous,
        }
    }

    /// Ledger entry for a keep-into-album swipe.
    pub fn into_compound(self, previous: Disposition) -> UndoableAction {
        UndoableAction::CompoundKeepAndAlbum {
            photo: self.photo,
            album: self.album,
            previous,
            kind: self.kind,
            source_album: self.source_album,
            created_artifact: self.artifact,
        }
    }
}

/// Performs album transfers and keeps store membership in step.
pub struct ClassifyCoordinator {
    photos: Arc<dyn PhotoStatusStore>,
    paths: AlbumPaths,
    transfer: TransferKind,
}

impl ClassifyCoordinator {
    pub fn new(
        photos: Arc<dyn PhotoStatusStore>,
        albums: Arc<dyn AlbumStore>,
        transfer: TransferKind,
        album_root: impl Into<String>,
    ) -> Self {
        Self {
            photos,
            paths: AlbumPaths::new(albums, album_root),
            transfer,
        }
    }

    pub fn paths(&self) -> &AlbumPaths {
        &self.paths
    }

    pub fn transfer(&self) -> TransferKind {
        self.transfer
    }

    /// Copy or move `photo` into `album`, then rewrite its album membership
    /// on the photo store so album views update immediately.
    ///
    /// On a membership failure after a copy, the copy is deleted again so no
    /// orphaned artifact is left behind.
    pub async fn assign(
        &self,
        photo: &PhotoRecord,
        album: &AlbumId,
    ) -> Result<AlbumAssignment, ClassifyError> {
        let path = self.paths.resolve(album).await;
        let transfer_err = |source| ClassifyError::Transfer {
            photo: photo.id,
            album: album.clone(),
            source,
        };

        let artifact = match self.transfer {
            TransferKind::Copy => Some(
                self.paths
                    .store()
                    .copy_photo_to_album(photo.id, &path)
                    .await
                    .map_err(transfer_err)?,
            ),
            TransferKind::Move => {
                self.paths
                    .store()
                    .move_photo_to_album(photo.id, &path)
                    .await
                    .map_err(transfer_err)?;
                None
            }
        };

        if let Err(source) = self.photos.update_album(photo.id, Some(album.clone())).await {
            if let Some(artifact) = &artifact
                && let Err(e) = self.paths.store().delete_artifact(artifact).await
            {
                warn!(photo = %photo.id, artifact = %artifact, error = %e, "failed to roll back album copy");
            }
            return Err(ClassifyError::Membership {
                photo: photo.id,
                source,
            });
        }

        debug!(photo = %photo.id, album = %album, kind = %self.transfer, path = %path, "photo filed into album");
        Ok(AlbumAssignment {
            photo: photo.id,
            album: album.clone(),
            kind: self.transfer,
            source_album: photo.album.clone(),
            artifact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAlbumStore, MemoryPhotoStore};

    fn fixture(transfer: TransferKind) -> (Arc<MemoryPhotoStore>, Arc<MemoryAlbumStore>, ClassifyCoordinator) {
        let photos = Arc::new(MemoryPhotoStore::new(vec![
            PhotoRecord::new(1, "content://1").with_disposition(Disposition::Keep),
        ]));
        let albums = Arc::new(MemoryAlbumStore::new(vec![
            Album::new("trips", "Trips"),
            Album::new("pets", "Pets / Cats"),
        ]));
        albums.set_album_path(AlbumId::new("trips"), "/storage/Trips");
        let coordinator =
            ClassifyCoordinator::new(photos.clone(), albums.clone(), transfer, "Pictures");
        (photos, albums, coordinator)
    }

    #[test]
    fn test_fallback_album_path_sanitizes_name() {
        assert_eq!(fallback_album_path("Pictures/", "Pets / Cats"), "Pictures/Pets _ Cats");
        assert_eq!(fallback_album_path("Pictures", "  "), "Pictures/Album");
    }

    #[test]
    fn test_transfer_kind_from_str() {
        assert_eq!("MOVE".parse::<TransferKind>().unwrap(), TransferKind::Move);
        assert!("link".parse::<TransferKind>().is_err());
    }

    #[tokio::test]
    async fn test_resolve_prefers_canonical_path() {
        let (_, _, coordinator) = fixture(TransferKind::Copy);
        assert_eq!(
            coordinator.paths().resolve(&AlbumId::new("trips")).await,
            "/storage/Trips"
        );
        assert_eq!(
            coordinator.paths().resolve(&AlbumId::new("pets")).await,
            "Pictures/Pets _ Cats"
        );
    }

    #[tokio::test]
    async fn test_copy_creates_artifact_and_updates_membership() {
        let (photos, albums, coordinator) = fixture(TransferKind::Copy);
        let record = photos.get_photo(PhotoId(1)).await.unwrap().unwrap();

        let assignment = coordinator
            .assign(&record, &AlbumId::new("trips"))
            .await
            .unwrap();

        let artifact = assignment.artifact.clone().unwrap();
        assert!(albums.artifact_exists(&artifact));
        assert_eq!(assignment.source_album, None);
        let updated = photos.get_photo(PhotoId(1)).await.unwrap().unwrap();
        assert_eq!(updated.album, Some(AlbumId::new("trips")));
    }

    #[tokio::test]
    async fn test_move_relocates_without_artifact() {
        let (photos, albums, coordinator) = fixture(TransferKind::Move);
        let record = photos.get_photo(PhotoId(1)).await.unwrap().unwrap();

        let assignment = coordinator
            .assign(&record, &AlbumId::new("pets"))
            .await
            .unwrap();

        assert!(assignment.artifact.is_none());
        assert_eq!(
            albums.location_of(PhotoId(1)).as_deref(),
            Some("Pictures/Pets _ Cats")
        );
    }

    #[tokio::test]
    async fn test_transfer_failure_leaves_membership_untouched() {
        let (photos, albums, coordinator) = fixture(TransferKind::Copy);
        albums.fail_transfers_for(PhotoId(1));
        let record = photos.get_photo(PhotoId(1)).await.unwrap().unwrap();

        let err = coordinator
            .assign(&record, &AlbumId::new("trips"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::Transfer { .. }));
        let unchanged = photos.get_photo(PhotoId(1)).await.unwrap().unwrap();
        assert_eq!(unchanged.album, None);
    }

    #[tokio::test]
    async fn test_membership_failure_rolls_back_copy() {
        let (photos, albums, coordinator) = fixture(TransferKind::Copy);
        photos.fail_updates_for(PhotoId(1));
        let record = photos.get_photo(PhotoId(1)).await.unwrap().unwrap();

        let err = coordinator
            .assign(&record, &AlbumId::new("trips"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::Membership { .. }));
        assert_eq!(albums.artifact_count(), 0);
    }
}
