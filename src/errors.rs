//! Typed error hierarchy for the photosweep engine.
//!
//! Two enums cover the engine surface:
//! - `WorkflowError`: engine operations that read or write collaborators
//! - `ClassifyError`: a failed album transfer for one photo
//!
//! State-machine operations themselves never fail; a deferred advance is a
//! value (`AdvanceRequest::ConfirmationRequired`), not an error.

use photosweep_common::{AlbumId, Disposition, PhotoId, StoreError};
use thiserror::Error;

use crate::stage::WorkflowStage;

/// Errors from a single album assignment.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Failed to transfer photo {photo} to album {album}: {source}")]
    Transfer {
        photo: PhotoId,
        album: AlbumId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to record album membership of photo {photo}: {source}")]
    Membership {
        photo: PhotoId,
        #[source]
        source: StoreError,
    },
}

impl ClassifyError {
    pub fn photo(&self) -> PhotoId {
        match self {
            ClassifyError::Transfer { photo, .. } | ClassifyError::Membership { photo, .. } => {
                *photo
            }
        }
    }
}

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Photo {id} not found")]
    PhotoNotFound { id: PhotoId },

    #[error("Operation requires stage {expected}, current stage is {actual}")]
    WrongStage {
        expected: WorkflowStage,
        actual: WorkflowStage,
    },

    #[error("Photos can only be restored to keep or maybe, not {disposition}")]
    InvalidRestoreTarget { disposition: Disposition },

    #[error("No photo left to classify")]
    NothingToClassify,

    #[error("Album {id} is not known")]
    UnknownAlbum { id: AlbumId },

    #[error("Delete confirmation belongs to a previous session")]
    StaleConfirmation,

    #[error("No permanent delete is awaiting confirmation")]
    NoPendingDelete,

    #[error("Workflow owner has shut down")]
    OwnerGone,

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
