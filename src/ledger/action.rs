//! Reversible actions recorded by the ledger.

use photosweep_common::{AlbumId, ArtifactRef, Disposition, PhotoId};
use serde::{Deserialize, Serialize};

use crate::classify::TransferKind;

/// A mutation the user can take back.
///
/// Every variant carries the disposition the photo had before the action,
/// so undo restores the real prior value rather than a fixed default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UndoableAction {
    /// Disposition assigned by a swipe or a COMPARE resolution.
    StatusChange {
        photo: PhotoId,
        previous: Disposition,
        new: Disposition,
    },
    /// Album transfer made in the CLASSIFY stage.
    AlbumOperation {
        photo: PhotoId,
        target_album: AlbumId,
        kind: TransferKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_album: Option<AlbumId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_artifact: Option<ArtifactRef>,
        previous: Disposition,
    },
    /// Keep plus album transfer made in one swipe.
    CompoundKeepAndAlbum {
        photo: PhotoId,
        album: AlbumId,
        previous: Disposition,
        kind: TransferKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_album: Option<AlbumId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_artifact: Option<ArtifactRef>,
    },
}

impl UndoableAction {
    pub fn photo(&self) -> PhotoId {
        match self {
            UndoableAction::StatusChange { photo, .. }
            | UndoableAction::AlbumOperation { photo, .. }
            | UndoableAction::CompoundKeepAndAlbum { photo, .. } => *photo,
        }
    }

    /// Disposition the photo returns to on undo.
    pub fn previous_disposition(&self) -> Disposition {
        match self {
            UndoableAction::StatusChange { previous, .. }
            | UndoableAction::AlbumOperation { previous, .. }
            | UndoableAction::CompoundKeepAndAlbum { previous, .. } => *previous,
        }
    }

    /// Disposition the action left the photo in.
    pub fn applied_disposition(&self) -> Disposition {
        match self {
            UndoableAction::StatusChange { new, .. } => *new,
            UndoableAction::AlbumOperation { previous, .. } => *previous,
            UndoableAction::CompoundKeepAndAlbum { .. } => Disposition::Keep,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            UndoableAction::StatusChange { .. } => "status_change",
            UndoableAction::AlbumOperation { .. } => "album_operation",
            UndoableAction::CompoundKeepAndAlbum { .. } => "compound_keep_and_album",
        }
    }
}
