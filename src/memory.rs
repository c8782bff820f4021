//! In-memory collaborators.
//!
//! Back the `simulate` command and the test suites. Each store publishes its
//! observable state through `watch` channels exactly like a platform backend
//! would, and can be told to fail for chosen photos.

use anyhow::{Context, Result};
use async_trait::async_trait;
use photosweep_common::{
    Album, AlbumId, AlbumStore, ArtifactRef, ConfirmationHandle, Disposition, FilterMode,
    MediaDeleter, PhotoId, PhotoRecord, PhotoStatusStore, Preferences, StoreError,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Photo status store held in a map, ordered by photo id.
pub struct MemoryPhotoStore {
    records: Mutex<BTreeMap<PhotoId, PhotoRecord>>,
    counts: HashMap<Disposition, watch::Sender<usize>>,
    lists: HashMap<Disposition, watch::Sender<Arc<Vec<PhotoRecord>>>>,
    failing_updates: Mutex<HashSet<PhotoId>>,
    failing_deletes: Mutex<HashSet<PhotoId>>,
    failing_reads: Mutex<HashSet<PhotoId>>,
}

impl MemoryPhotoStore {
    pub fn new(records: Vec<PhotoRecord>) -> Self {
        let records: BTreeMap<PhotoId, PhotoRecord> =
            records.into_iter().map(|r| (r.id, r)).collect();
        let mut counts = HashMap::new();
        let mut lists = HashMap::new();
        for disposition in Disposition::ALL {
            let list = filtered(&records, disposition);
            counts.insert(disposition, watch::channel(list.len()).0);
            lists.insert(disposition, watch::channel(Arc::new(list)).0);
        }
        Self {
            records: Mutex::new(records),
            counts,
            lists,
            failing_updates: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            failing_reads: Mutex::new(HashSet::new()),
        }
    }

    /// Make every `update_*` call for `id` fail.
    pub fn fail_updates_for(&self, id: PhotoId) {
        lock(&self.failing_updates).insert(id);
    }

    /// Make `delete_record` for `id` fail.
    pub fn fail_deletes_for(&self, id: PhotoId) {
        lock(&self.failing_deletes).insert(id);
    }

    /// Make `get_photo` for `id` fail.
    pub fn fail_reads_for(&self, id: PhotoId) {
        lock(&self.failing_reads).insert(id);
    }

    pub fn clear_failures(&self) {
        lock(&self.failing_updates).clear();
        lock(&self.failing_deletes).clear();
        lock(&self.failing_reads).clear();
    }

    /// Add or replace a record, as an import would.
    pub fn insert(&self, record: PhotoRecord) {
        lock(&self.records).insert(record.id, record);
        self.publish();
    }

    pub fn all(&self) -> Vec<PhotoRecord> {
        lock(&self.records).values().cloned().collect()
    }

    fn publish(&self) {
        let records = lock(&self.records);
        for disposition in Disposition::ALL {
            let list = filtered(&records, disposition);
            if let Some(sender) = self.counts.get(&disposition) {
                let count = list.len();
                sender.send_if_modified(|current| {
                    let changed = *current != count;
                    *current = count;
                    changed
                });
            }
            if let Some(sender) = self.lists.get(&disposition) {
                sender.send_if_modified(|current| {
                    if current.as_slice() == list.as_slice() {
                        return false;
                    }
                    *current = Arc::new(list);
                    true
                });
            }
        }
    }

    fn modify(
        &self,
        id: PhotoId,
        apply: impl FnOnce(&mut PhotoRecord),
    ) -> Result<(), StoreError> {
        if lock(&self.failing_updates).contains(&id) {
            return Err(StoreError::Io(format!("update of photo {} failed", id)));
        }
        {
            let mut records = lock(&self.records);
            let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            apply(record);
        }
        self.publish();
        Ok(())
    }
}

fn filtered(records: &BTreeMap<PhotoId, PhotoRecord>, disposition: Disposition) -> Vec<PhotoRecord> {
    records
        .values()
        .filter(|r| r.disposition == disposition)
        .cloned()
        .collect()
}

#[async_trait]
impl PhotoStatusStore for MemoryPhotoStore {
    fn count_by_disposition(&self, disposition: Disposition) -> watch::Receiver<usize> {
        match self.counts.get(&disposition) {
            Some(sender) => sender.subscribe(),
            None => watch::channel(0).1,
        }
    }

    fn photos_by_disposition(
        &self,
        disposition: Disposition,
    ) -> watch::Receiver<Arc<Vec<PhotoRecord>>> {
        match self.lists.get(&disposition) {
            Some(sender) => sender.subscribe(),
            None => watch::channel(Arc::new(Vec::new())).1,
        }
    }

    async fn get_photo(&self, id: PhotoId) -> Result<Option<PhotoRecord>, StoreError> {
        if lock(&self.failing_reads).contains(&id) {
            return Err(StoreError::Io(format!("read of photo {} failed", id)));
        }
        Ok(lock(&self.records).get(&id).cloned())
    }

    async fn update_disposition(
        &self,
        id: PhotoId,
        disposition: Disposition,
    ) -> Result<(), StoreError> {
        self.modify(id, |record| record.disposition = disposition)
    }

    async fn delete_record(&self, id: PhotoId) -> Result<(), StoreError> {
        if lock(&self.failing_deletes).contains(&id) {
            return Err(StoreError::Io(format!("delete of photo {} failed", id)));
        }
        lock(&self.records)
            .remove(&id)
            .ok_or(StoreError::NotFound(id))?;
        self.publish();
        Ok(())
    }

    async fn update_album(&self, id: PhotoId, album: Option<AlbumId>) -> Result<(), StoreError> {
        self.modify(id, |record| record.album = album)
    }
}

/// Album backend keeping copies and photo locations as plain strings.
pub struct MemoryAlbumStore {
    albums: watch::Sender<Arc<Vec<Album>>>,
    paths: Mutex<HashMap<AlbumId, String>>,
    artifacts: Mutex<HashMap<ArtifactRef, PhotoId>>,
    locations: Mutex<HashMap<PhotoId, String>>,
    failing: Mutex<HashSet<PhotoId>>,
    next_artifact: AtomicU64,
}

impl MemoryAlbumStore {
    pub fn new(albums: Vec<Album>) -> Self {
        Self {
            albums: watch::channel(Arc::new(albums)).0,
            paths: Mutex::new(HashMap::new()),
            artifacts: Mutex::new(HashMap::new()),
            locations: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            next_artifact: AtomicU64::new(1),
        }
    }

    /// Give an album a canonical path; albums without one fall back to a
    /// name-derived path.
    pub fn set_album_path(&self, album: AlbumId, path: &str) {
        lock(&self.paths).insert(album, path.to_string());
    }

    pub fn set_albums(&self, albums: Vec<Album>) {
        self.albums.send_replace(Arc::new(albums));
    }

    /// Make copies and moves of `photo` fail.
    pub fn fail_transfers_for(&self, photo: PhotoId) {
        lock(&self.failing).insert(photo);
    }

    pub fn artifact_exists(&self, artifact: &ArtifactRef) -> bool {
        lock(&self.artifacts).contains_key(artifact)
    }

    pub fn artifact_count(&self) -> usize {
        lock(&self.artifacts).len()
    }

    /// Where the last move put the photo.
    pub fn location_of(&self, photo: PhotoId) -> Option<String> {
        lock(&self.locations).get(&photo).cloned()
    }

    fn check(&self, photo: PhotoId) -> Result<(), StoreError> {
        if lock(&self.failing).contains(&photo) {
            return Err(StoreError::Io(format!("transfer of photo {} failed", photo)));
        }
        Ok(())
    }
}

#[async_trait]
impl AlbumStore for MemoryAlbumStore {
    async fn resolve_album_path(&self, album: &AlbumId) -> Option<String> {
        lock(&self.paths).get(album).cloned()
    }

    async fn copy_photo_to_album(
        &self,
        photo: PhotoId,
        path: &str,
    ) -> Result<ArtifactRef, StoreError> {
        self.check(photo)?;
        let n = self.next_artifact.fetch_add(1, Ordering::Relaxed);
        let artifact = ArtifactRef(format!("{}/photo-{}-copy{}", path, photo, n));
        lock(&self.artifacts).insert(artifact.clone(), photo);
        Ok(artifact)
    }

    async fn move_photo_to_album(&self, photo: PhotoId, path: &str) -> Result<(), StoreError> {
        self.check(photo)?;
        lock(&self.locations).insert(photo, path.to_string());
        Ok(())
    }

    async fn delete_artifact(&self, artifact: &ArtifactRef) -> Result<(), StoreError> {
        lock(&self.artifacts)
            .remove(artifact)
            .map(|_| ())
            .ok_or_else(|| StoreError::ArtifactMissing(artifact.to_string()))
    }

    fn list_albums(&self) -> watch::Receiver<Arc<Vec<Album>>> {
        self.albums.subscribe()
    }
}

/// Media deleter that either deletes at once or hands out confirmation
/// tokens, depending on how it was built.
pub struct MemoryDeleter {
    requires_confirmation: bool,
    failing: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    next_token: AtomicU64,
}

impl MemoryDeleter {
    pub fn immediate() -> Self {
        Self::new(false)
    }

    pub fn with_confirmation() -> Self {
        Self::new(true)
    }

    pub fn new(requires_confirmation: bool) -> Self {
        Self {
            requires_confirmation,
            failing: Mutex::new(HashSet::new()),
            deleted: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn fail_for(&self, uri: &str) {
        lock(&self.failing).insert(uri.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.deleted).clone()
    }
}

#[async_trait]
impl MediaDeleter for MemoryDeleter {
    fn requires_confirmation(&self) -> bool {
        self.requires_confirmation
    }

    async fn request_delete_confirmation(
        &self,
        uris: &[String],
    ) -> Result<ConfirmationHandle, StoreError> {
        let n = self.next_token.fetch_add(1, Ordering::Relaxed);
        Ok(ConfirmationHandle {
            token: format!("delete-{}", n),
            uris: uris.to_vec(),
        })
    }

    async fn delete_media(&self, uri: &str) -> Result<(), StoreError> {
        if lock(&self.failing).contains(uri) {
            return Err(StoreError::Rejected(format!("{} is write-protected", uri)));
        }
        lock(&self.deleted).push(uri.to_string());
        Ok(())
    }
}

/// Preference streams with setters.
pub struct MemoryPreferences {
    filter_mode: watch::Sender<FilterMode>,
    classification_on_swipe: watch::Sender<bool>,
    daily_task_target: watch::Sender<u32>,
}

impl Default for MemoryPreferences {
    fn default() -> Self {
        Self::new(FilterMode::All, false, 0)
    }
}

impl MemoryPreferences {
    pub fn new(filter_mode: FilterMode, classification_on_swipe: bool, daily_task_target: u32) -> Self {
        Self {
            filter_mode: watch::channel(filter_mode).0,
            classification_on_swipe: watch::channel(classification_on_swipe).0,
            daily_task_target: watch::channel(daily_task_target).0,
        }
    }

    pub fn set_filter_mode(&self, mode: FilterMode) {
        self.filter_mode.send_replace(mode);
    }

    pub fn set_classification_on_swipe(&self, enabled: bool) {
        self.classification_on_swipe.send_replace(enabled);
    }

    pub fn set_daily_task_target(&self, target: u32) {
        self.daily_task_target.send_replace(target);
    }
}

impl Preferences for MemoryPreferences {
    fn filter_mode(&self) -> watch::Receiver<FilterMode> {
        self.filter_mode.subscribe()
    }

    fn classification_on_swipe(&self) -> watch::Receiver<bool> {
        self.classification_on_swipe.subscribe()
    }

    fn daily_task_target(&self) -> watch::Receiver<u32> {
        self.daily_task_target.subscribe()
    }
}

/// A photo library described in JSON, used by `photosweep simulate`.
///
/// ```json
/// {
///   "photos": [{ "id": 1, "uri": "content://1" }],
///   "albums": [{ "id": "trips", "name": "Trips" }],
///   "album_paths": { "trips": "/storage/Trips" },
///   "requires_confirmation": false
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryFixture {
    #[serde(default)]
    pub photos: Vec<PhotoRecord>,
    #[serde(default)]
    pub albums: Vec<Album>,
    #[serde(default)]
    pub album_paths: BTreeMap<AlbumId, String>,
    #[serde(default)]
    pub requires_confirmation: bool,
}

/// Stores built from a fixture.
pub struct MemoryLibrary {
    pub photos: Arc<MemoryPhotoStore>,
    pub albums: Arc<MemoryAlbumStore>,
    pub deleter: Arc<MemoryDeleter>,
}

impl LibraryFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read library file {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse library file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn into_library(self) -> MemoryLibrary {
        let albums = MemoryAlbumStore::new(self.albums);
        for (album, path) in &self.album_paths {
            albums.set_album_path(album.clone(), path);
        }
        MemoryLibrary {
            photos: Arc::new(MemoryPhotoStore::new(self.photos)),
            albums: Arc::new(albums),
            deleter: Arc::new(MemoryDeleter::new(self.requires_confirmation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_photo_store_publishes_counts_on_update() {
        let store = MemoryPhotoStore::new(vec![
            PhotoRecord::new(1, "content://1"),
            PhotoRecord::new(2, "content://2"),
        ]);
        let mut unsorted = store.count_by_disposition(Disposition::Unsorted);
        let trash = store.photos_by_disposition(Disposition::Trash);
        assert_eq!(*unsorted.borrow_and_update(), 2);

        store
            .update_disposition(PhotoId(1), Disposition::Trash)
            .await
            .unwrap();

        assert!(unsorted.has_changed().unwrap());
        assert_eq!(*unsorted.borrow_and_update(), 1);
        assert_eq!(trash.borrow().len(), 1);
        assert_eq!(trash.borrow()[0].id, PhotoId(1));
    }

    #[tokio::test]
    async fn test_photo_store_unknown_id_is_not_found() {
        let store = MemoryPhotoStore::new(Vec::new());
        let err = store
            .update_disposition(PhotoId(9), Disposition::Keep)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound(PhotoId(9)));
    }

    #[tokio::test]
    async fn test_album_store_delete_unknown_artifact() {
        let store = MemoryAlbumStore::new(Vec::new());
        let err = store
            .delete_artifact(&ArtifactRef("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ArtifactMissing(_)));
    }

    #[test]
    fn test_fixture_parses_minimal_json() {
        let fixture = LibraryFixture::parse(
            r#"{
                "photos": [{"id": 1, "uri": "content://1"}, {"id": 2, "uri": "content://2", "disposition": "maybe"}],
                "albums": [{"id": "trips", "name": "Trips"}],
                "album_paths": {"trips": "/storage/Trips"}
            }"#,
        )
        .unwrap();

        assert_eq!(fixture.photos.len(), 2);
        assert_eq!(fixture.photos[1].disposition, Disposition::Maybe);
        assert!(!fixture.requires_confirmation);
        let library = fixture.into_library();
        assert_eq!(library.photos.all().len(), 2);
    }

    #[test]
    fn test_preferences_setters_notify() {
        let prefs = MemoryPreferences::default();
        let mut target = prefs.daily_task_target();
        prefs.set_daily_task_target(20);
        assert!(target.has_changed().unwrap());
        assert_eq!(*target.borrow_and_update(), 20);
    }
}
