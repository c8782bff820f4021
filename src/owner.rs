//! The single state owner.
//!
//! One task owns the `WorkflowEngine` and applies intents one at a time, so
//! no two mutations interleave. Callers talk to it through an
//! `EngineHandle`: intents go in over an mpsc channel, each with a oneshot
//! for the reply, and state comes back out over a watch channel.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::{EngineState, SourceWatch, WorkflowEngine};
use crate::errors::WorkflowError;
use crate::intent::{Intent, IntentOutcome};

const COMMAND_BUFFER: usize = 64;

struct Command {
    intent: Intent,
    reply: oneshot::Sender<Result<IntentOutcome, WorkflowError>>,
}

/// Cloneable handle to the owner task.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<EngineState>,
}

impl EngineHandle {
    /// Send an intent and wait for the owner to apply it.
    pub async fn send(&self, intent: Intent) -> Result<IntentOutcome, WorkflowError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command { intent, reply })
            .await
            .map_err(|_| WorkflowError::OwnerGone)?;
        response.await.map_err(|_| WorkflowError::OwnerGone)?
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }
}

/// Move the engine into its owner task.
///
/// The task ends when every handle is dropped, and hands the engine back so
/// callers can inspect or dispose it.
pub fn spawn(engine: WorkflowEngine) -> (EngineHandle, JoinHandle<WorkflowEngine>) {
    let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
    let handle = EngineHandle {
        commands,
        state: engine.subscribe(),
    };
    let sources = engine.source_watch();
    let task = tokio::spawn(run(engine, receiver, sources));
    (handle, task)
}

async fn run(
    mut engine: WorkflowEngine,
    mut commands: mpsc::Receiver<Command>,
    mut sources: SourceWatch,
) -> WorkflowEngine {
    let mut sources_open = true;
    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(Command { intent, reply }) = command else {
                    break;
                };
                let name = intent.name();
                let result = engine.apply(intent).await;
                if let Err(e) = &result {
                    warn!(intent = name, error = %e, "intent rejected");
                }
                if reply.send(result).is_err() {
                    debug!(intent = name, "caller went away before the reply");
                }
            }
            changed = source_changed(&mut sources), if sources_open => {
                if changed {
                    engine.on_sources_changed();
                } else {
                    debug!("a workflow source closed, no longer watching sources");
                    sources_open = false;
                }
            }
        }
    }
    debug!("all engine handles dropped, owner stopping");
    engine
}

async fn source_changed(sources: &mut SourceWatch) -> bool {
    let result = tokio::select! {
        r = sources.unsorted.changed() => r,
        r = sources.filter_mode.changed() => r,
        r = sources.classification_on_swipe.changed() => r,
        r = sources.daily_task_target.changed() => r,
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Collaborators, EngineOptions, LaunchMode};
    use crate::memory::{MemoryAlbumStore, MemoryDeleter, MemoryPhotoStore, MemoryPreferences};
    use crate::stage::WorkflowStage;
    use photosweep_common::{Disposition, PhotoId, PhotoRecord};
    use std::sync::Arc;

    fn engine(prefs: Arc<MemoryPreferences>) -> WorkflowEngine {
        WorkflowEngine::new(
            Collaborators {
                photos: Arc::new(MemoryPhotoStore::new(
                    (1..=3)
                        .map(|n| PhotoRecord::new(n, format!("content://{}", n)))
                        .collect(),
                )),
                albums: Arc::new(MemoryAlbumStore::new(Vec::new())),
                deleter: Arc::new(MemoryDeleter::immediate()),
                preferences: prefs,
            },
            EngineOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_intents_are_applied_in_order() {
        let (handle, task) = spawn(engine(Arc::new(MemoryPreferences::default())));

        handle
            .send(Intent::Start {
                mode: LaunchMode::Standard,
            })
            .await
            .unwrap();
        for n in 1..=3 {
            handle
                .send(Intent::Swipe {
                    photo: PhotoId(n),
                    decision: Disposition::Keep,
                })
                .await
                .unwrap();
        }

        let state = handle.state();
        assert_eq!(state.machine.stage(), WorkflowStage::Compare);
        assert_eq!(state.machine.sets().keep.len(), 3);

        drop(handle);
        let engine = task.await.unwrap();
        assert_eq!(engine.machine().stats().total_sorted, 3);
    }

    #[tokio::test]
    async fn test_rejected_intent_reports_error() {
        let (handle, _task) = spawn(engine(Arc::new(MemoryPreferences::default())));
        handle
            .send(Intent::Start {
                mode: LaunchMode::Standard,
            })
            .await
            .unwrap();

        let err = handle.send(Intent::SkipClassify).await.unwrap_err();
        assert!(matches!(err, WorkflowError::WrongStage { .. }));
    }

    #[tokio::test]
    async fn test_preference_change_reaches_engine() {
        let prefs = Arc::new(MemoryPreferences::default());
        let (handle, _task) = spawn(engine(prefs.clone()));
        let mut state = handle.subscribe();

        prefs.set_classification_on_swipe(true);
        let updated = state
            .wait_for(|s| s.machine.classification_on_swipe())
            .await
            .unwrap()
            .clone();
        assert!(updated.machine.classification_on_swipe());
    }

    #[tokio::test]
    async fn test_send_after_owner_stopped() {
        let (handle, task) = spawn(engine(Arc::new(MemoryPreferences::default())));
        task.abort();
        let _ = task.await;

        let err = handle.send(Intent::Undo).await.unwrap_err();
        assert!(matches!(err, WorkflowError::OwnerGone));
    }
}
