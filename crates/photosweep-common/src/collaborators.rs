//! Contracts of the collaborators the workflow engine drives.
//!
//! Observable sources are exposed as `tokio::sync::watch` receivers: each
//! holds the latest value and wakes subscribers on change, which is all the
//! engine needs to recompute its snapshot. Writes are async and fallible.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::photo::{Album, AlbumId, ArtifactRef, Disposition, FilterMode, PhotoId, PhotoRecord};

/// Persistent per-photo disposition and album membership.
///
/// Real implementation: the platform media database. Test double:
/// `photosweep::memory::MemoryPhotoStore`.
#[async_trait]
pub trait PhotoStatusStore: Send + Sync {
    fn count_by_disposition(&self, disposition: Disposition) -> watch::Receiver<usize>;

    fn photos_by_disposition(
        &self,
        disposition: Disposition,
    ) -> watch::Receiver<Arc<Vec<PhotoRecord>>>;

    async fn get_photo(&self, id: PhotoId) -> Result<Option<PhotoRecord>, StoreError>;

    async fn update_disposition(
        &self,
        id: PhotoId,
        disposition: Disposition,
    ) -> Result<(), StoreError>;

    async fn delete_record(&self, id: PhotoId) -> Result<(), StoreError>;

    async fn update_album(&self, id: PhotoId, album: Option<AlbumId>) -> Result<(), StoreError>;
}

/// Album backend performing the file-level copy or move.
#[async_trait]
pub trait AlbumStore: Send + Sync {
    /// Canonical path of an album, when the backend knows one.
    async fn resolve_album_path(&self, album: &AlbumId) -> Option<String>;

    async fn copy_photo_to_album(
        &self,
        photo: PhotoId,
        path: &str,
    ) -> Result<ArtifactRef, StoreError>;

    async fn move_photo_to_album(&self, photo: PhotoId, path: &str) -> Result<(), StoreError>;

    /// Remove a file created by an earlier copy.
    async fn delete_artifact(&self, artifact: &ArtifactRef) -> Result<(), StoreError>;

    fn list_albums(&self) -> watch::Receiver<Arc<Vec<Album>>>;
}

/// Handle returned by the system when it has to ask the user before an
/// irreversible delete. The UI presents it and reports back a yes/no.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationHandle {
    pub token: String,
    pub uris: Vec<String>,
}

/// Platform-provided media deletion.
#[async_trait]
pub trait MediaDeleter: Send + Sync {
    /// Whether this platform requires an explicit user confirmation before
    /// deleting media. When true, `request_delete_confirmation` is used and
    /// the platform itself removes the files once the user agrees.
    fn requires_confirmation(&self) -> bool;

    async fn request_delete_confirmation(
        &self,
        uris: &[String],
    ) -> Result<ConfirmationHandle, StoreError>;

    /// Delete one media item immediately.
    async fn delete_media(&self, uri: &str) -> Result<(), StoreError>;
}

/// User preference streams.
pub trait Preferences: Send + Sync {
    fn filter_mode(&self) -> watch::Receiver<FilterMode>;

    fn classification_on_swipe(&self) -> watch::Receiver<bool>;

    /// Daily quota target; 0 means daily-task mode has no target set.
    fn daily_task_target(&self) -> watch::Receiver<u32>;
}
