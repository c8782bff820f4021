//! Reactive aggregation of the engine state and every upstream source into
//! one published `WorkflowSnapshot`.
//!
//! The aggregator is a task waiting on all source receivers at once. On any
//! change it recomposes from the latest values and replaces the published
//! snapshot; intermediate snapshots nobody read are simply overwritten.

pub mod snapshot;

pub use snapshot::{
    AggregatorInputs, WorkflowSnapshot, daily_status, swipe_pool, swipe_remaining,
};

use photosweep_common::{
    Album, AlbumStore, Disposition, FilterMode, PhotoRecord, PhotoStatusStore, Preferences,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::EngineState;

struct Sources {
    engine: watch::Receiver<EngineState>,
    unsorted: watch::Receiver<Arc<Vec<PhotoRecord>>>,
    keep: watch::Receiver<Arc<Vec<PhotoRecord>>>,
    maybe: watch::Receiver<Arc<Vec<PhotoRecord>>>,
    trash: watch::Receiver<Arc<Vec<PhotoRecord>>>,
    albums: watch::Receiver<Arc<Vec<Album>>>,
    filter_mode: watch::Receiver<FilterMode>,
    daily_task_target: watch::Receiver<u32>,
}

impl Sources {
    fn compose(&mut self) -> WorkflowSnapshot {
        let state = self.engine.borrow_and_update().clone();
        let unsorted = self.unsorted.borrow_and_update().clone();
        let keep = self.keep.borrow_and_update().clone();
        let maybe = self.maybe.borrow_and_update().clone();
        let trash = self.trash.borrow_and_update().clone();
        let albums = self.albums.borrow_and_update().clone();
        let filter_mode = self.filter_mode.borrow_and_update().clone();
        let daily_task_target = *self.daily_task_target.borrow_and_update();

        AggregatorInputs {
            state: &state,
            unsorted: &unsorted,
            keep: &keep,
            maybe: &maybe,
            trash: &trash,
            albums: &albums,
            filter_mode: &filter_mode,
            daily_task_target,
        }
        .compose()
    }

    /// Wait until any source changes. `false` once a source has closed.
    async fn changed(&mut self) -> bool {
        let result = tokio::select! {
            r = self.engine.changed() => r,
            r = self.unsorted.changed() => r,
            r = self.keep.changed() => r,
            r = self.maybe.changed() => r,
            r = self.trash.changed() => r,
            r = self.albums.changed() => r,
            r = self.filter_mode.changed() => r,
            r = self.daily_task_target.changed() => r,
        };
        result.is_ok()
    }
}

/// Publishes a fresh `WorkflowSnapshot` whenever any input changes.
pub struct ReactiveAggregator {
    snapshots: watch::Receiver<WorkflowSnapshot>,
    task: JoinHandle<()>,
}

impl ReactiveAggregator {
    pub fn spawn(
        engine: watch::Receiver<EngineState>,
        photos: &dyn PhotoStatusStore,
        albums: &dyn AlbumStore,
        preferences: &dyn Preferences,
    ) -> Self {
        let mut sources = Sources {
            engine,
            unsorted: photos.photos_by_disposition(Disposition::Unsorted),
            keep: photos.photos_by_disposition(Disposition::Keep),
            maybe: photos.photos_by_disposition(Disposition::Maybe),
            trash: photos.photos_by_disposition(Disposition::Trash),
            albums: albums.list_albums(),
            filter_mode: preferences.filter_mode(),
            daily_task_target: preferences.daily_task_target(),
        };
        let (tx, snapshots) = watch::channel(sources.compose());

        let task = tokio::spawn(async move {
            while sources.changed().await {
                let snapshot = sources.compose();
                tx.send_replace(snapshot);
            }
            debug!("aggregator source closed, stopping");
        });

        Self { snapshots, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.snapshots.clone()
    }

    pub fn current(&self) -> WorkflowSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait for the first snapshot built from engine revision `revision` or
    /// later.
    pub async fn snapshot_at(&self, revision: u64) -> Option<WorkflowSnapshot> {
        let mut rx = self.snapshots.clone();
        rx.wait_for(|s| s.revision >= revision)
            .await
            .ok()
            .map(|s| s.clone())
    }
}

impl Drop for ReactiveAggregator {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Collaborators, EngineOptions, LaunchMode, WorkflowEngine};
    use crate::memory::{MemoryAlbumStore, MemoryDeleter, MemoryPhotoStore, MemoryPreferences};
    use crate::stage::WorkflowStage;
    use photosweep_common::PhotoId;

    fn engine(prefs: Arc<MemoryPreferences>) -> WorkflowEngine {
        WorkflowEngine::new(
            Collaborators {
                photos: Arc::new(MemoryPhotoStore::new(
                    (1..=20)
                        .map(|n| PhotoRecord::new(n, format!("content://{}", n)))
                        .collect(),
                )),
                albums: Arc::new(MemoryAlbumStore::new(vec![Album::new("trips", "Trips")])),
                deleter: Arc::new(MemoryDeleter::immediate()),
                preferences: prefs,
            },
            EngineOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_snapshot_follows_engine_mutations() {
        let mut engine = engine(Arc::new(MemoryPreferences::default()));
        let aggregator = engine.aggregator();
        engine.start(LaunchMode::Standard);
        engine
            .swipe(PhotoId(1), Disposition::Maybe)
            .await
            .unwrap();

        let revision = engine.state().revision;
        let snapshot = aggregator.snapshot_at(revision).await.unwrap();
        assert_eq!(snapshot.stage, WorkflowStage::Swipe);
        assert_eq!(snapshot.unsorted_remaining, 19);
        assert!(snapshot.can_undo);
        assert_eq!(snapshot.albums.len(), 1);
    }

    #[tokio::test]
    async fn test_preference_change_republishes() {
        let prefs = Arc::new(MemoryPreferences::default());
        let mut engine = engine(prefs.clone());
        let aggregator = engine.aggregator();
        engine.start(LaunchMode::DailyTask);
        let mut rx = aggregator.subscribe();

        prefs.set_daily_task_target(5);
        let snapshot = rx
            .wait_for(|s| s.daily_task.is_some())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.unsorted_remaining, 5);
    }
}
