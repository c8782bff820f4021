//! The session workflow: stage state machine and the values it hands out.

pub mod machine;

pub use machine::WorkflowStateMachine;

use photosweep_common::PhotoId;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::stage::WorkflowStage;

/// Identifier of one sorting session.
pub type SessionId = uuid::Uuid;

/// A stage change that took place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTransition {
    pub from: WorkflowStage,
    pub to: WorkflowStage,
}

/// Answer to an advance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AdvanceRequest {
    /// Nothing was left to do; the stage changed.
    Advanced(StageTransition),
    /// Work remains in `stage`; nothing changed until the caller confirms.
    ConfirmationRequired { stage: WorkflowStage, remaining: usize },
    /// The session is already at VICTORY.
    AlreadyFinished,
}

/// Why a photo left the session trash set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrashRemoval {
    Restored,
    Deleted,
    /// The record vanished from the store; not counted in the stats
    Missing,
}

/// What an automatic advance replaced, so undoing the action that caused
/// it can put the session back in the stage it left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRewind {
    pub transition: StageTransition,
    classify: Option<ClassifyQueue>,
    trash_selection: Arc<BTreeSet<PhotoId>>,
    stats_frozen: bool,
}

/// The CLASSIFY stage's cursor over the photos kept this session.
///
/// The photo list is materialized once on stage entry, in ascending id
/// order, and does not change while the stage runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifyQueue {
    pub photos: Arc<Vec<PhotoId>>,
    pub cursor: usize,
    /// Positions passed over without filing
    pub skipped: BTreeSet<usize>,
}

impl ClassifyQueue {
    pub fn new(photos: Vec<PhotoId>) -> Self {
        Self {
            photos: Arc::new(photos),
            cursor: 0,
            skipped: BTreeSet::new(),
        }
    }

    pub fn current(&self) -> Option<PhotoId> {
        self.photos.get(self.cursor).copied()
    }

    pub fn total(&self) -> usize {
        self.photos.len()
    }

    pub fn remaining(&self) -> usize {
        self.photos.len().saturating_sub(self.cursor)
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.photos.len()
    }
}
