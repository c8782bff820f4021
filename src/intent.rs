//! User intents and their dispatch onto the engine.
//!
//! Intents are plain serde values so scripted sessions can be written as
//! JSON:
//!
//! ```json
//! [
//!   { "intent": "start" },
//!   { "intent": "swipe", "photo": 1, "decision": "keep" },
//!   { "intent": "request_advance" }
//! ]
//! ```

use photosweep_common::{AlbumId, Disposition, PhotoId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cleanup::{BatchOutcome, DeleteRequest};
use crate::engine::{LaunchMode, WorkflowEngine};
use crate::errors::WorkflowError;
use crate::workflow::{AdvanceRequest, SessionId, StageTransition};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Start {
        #[serde(default)]
        mode: LaunchMode,
    },
    Swipe {
        photo: PhotoId,
        decision: Disposition,
    },
    SwipeKeepToAlbum {
        photo: PhotoId,
        album: AlbumId,
    },
    /// Resolve a deferred photo in COMPARE
    Resolve {
        photo: PhotoId,
        disposition: Disposition,
    },
    RequestAdvance,
    ConfirmAdvance,
    CancelAdvance,
    Undo,
    ClassifyToAlbum {
        album: AlbumId,
    },
    SkipClassify,
    ToggleTrashSelection {
        photo: PhotoId,
    },
    SelectAllTrash,
    ClearTrashSelection,
    RestoreSelected {
        disposition: Disposition,
    },
    RequestPermanentDelete,
    ConfirmDelete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        confirmed: bool,
    },
    Exit,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Start { .. } => "start",
            Intent::Swipe { .. } => "swipe",
            Intent::SwipeKeepToAlbum { .. } => "swipe_keep_to_album",
            Intent::Resolve { .. } => "resolve",
            Intent::RequestAdvance => "request_advance",
            Intent::ConfirmAdvance => "confirm_advance",
            Intent::CancelAdvance => "cancel_advance",
            Intent::Undo => "undo",
            Intent::ClassifyToAlbum { .. } => "classify_to_album",
            Intent::SkipClassify => "skip_classify",
            Intent::ToggleTrashSelection { .. } => "toggle_trash_selection",
            Intent::SelectAllTrash => "select_all_trash",
            Intent::ClearTrashSelection => "clear_trash_selection",
            Intent::RestoreSelected { .. } => "restore_selected",
            Intent::RequestPermanentDelete => "request_permanent_delete",
            Intent::ConfirmDelete { .. } => "confirm_delete",
            Intent::Exit => "exit",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What applying an intent produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IntentOutcome {
    Started { session: SessionId },
    Applied,
    Advance { request: AdvanceRequest },
    Transition { transition: Option<StageTransition> },
    AdvanceCancelled { was_pending: bool },
    Undone { reverted: bool },
    Classified { photo: PhotoId },
    Skipped { photo: PhotoId },
    SelectionToggled { toggled: bool },
    Batch { outcome: BatchOutcome },
    DeleteAwaitingConfirmation { token: String, count: usize },
    DeleteDeclined,
    Exited,
}

impl WorkflowEngine {
    /// Apply one intent.
    pub async fn apply(&mut self, intent: Intent) -> Result<IntentOutcome, WorkflowError> {
        let outcome = match intent {
            Intent::Start { mode } => IntentOutcome::Started {
                session: self.start(mode),
            },
            Intent::Swipe { photo, decision } => {
                self.swipe(photo, decision).await?;
                IntentOutcome::Applied
            }
            Intent::SwipeKeepToAlbum { photo, album } => {
                self.swipe_keep_to_album(photo, album).await?;
                IntentOutcome::Applied
            }
            Intent::Resolve { photo, disposition } => {
                self.resolve_maybe(photo, disposition).await?;
                IntentOutcome::Applied
            }
            Intent::RequestAdvance => IntentOutcome::Advance {
                request: self.request_advance(),
            },
            Intent::ConfirmAdvance => IntentOutcome::Transition {
                transition: self.confirm_advance(),
            },
            Intent::CancelAdvance => IntentOutcome::AdvanceCancelled {
                was_pending: self.cancel_advance(),
            },
            Intent::Undo => IntentOutcome::Undone {
                reverted: self.undo().await?,
            },
            Intent::ClassifyToAlbum { album } => IntentOutcome::Classified {
                photo: self.classify_current_to_album(album).await?,
            },
            Intent::SkipClassify => IntentOutcome::Skipped {
                photo: self.skip_classify()?,
            },
            Intent::ToggleTrashSelection { photo } => IntentOutcome::SelectionToggled {
                toggled: self.toggle_trash_selection(photo)?,
            },
            Intent::SelectAllTrash => {
                self.select_all_trash()?;
                IntentOutcome::Applied
            }
            Intent::ClearTrashSelection => {
                self.clear_trash_selection()?;
                IntentOutcome::Applied
            }
            Intent::RestoreSelected { disposition } => IntentOutcome::Batch {
                outcome: self.restore_selected(disposition).await?,
            },
            Intent::RequestPermanentDelete => match self.request_permanent_delete().await? {
                DeleteRequest::AwaitingConfirmation(pending) => {
                    IntentOutcome::DeleteAwaitingConfirmation {
                        token: pending.handle.token,
                        count: pending.photos.len(),
                    }
                }
                DeleteRequest::Completed(outcome) => IntentOutcome::Batch { outcome },
            },
            Intent::ConfirmDelete { token, confirmed } => {
                match self.confirm_delete(token.as_deref(), confirmed).await? {
                    Some(outcome) => IntentOutcome::Batch { outcome },
                    None => IntentOutcome::DeleteDeclined,
                }
            }
            Intent::Exit => {
                self.exit();
                IntentOutcome::Exited
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_json_shape() {
        let intents: Vec<Intent> = serde_json::from_str(
            r#"[
                {"intent": "start"},
                {"intent": "start", "mode": "daily_task"},
                {"intent": "swipe", "photo": 3, "decision": "trash"},
                {"intent": "swipe_keep_to_album", "photo": 4, "album": "trips"},
                {"intent": "confirm_delete", "confirmed": false},
                {"intent": "undo"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            intents[0],
            Intent::Start {
                mode: LaunchMode::Standard
            }
        );
        assert_eq!(
            intents[1],
            Intent::Start {
                mode: LaunchMode::DailyTask
            }
        );
        assert_eq!(
            intents[2],
            Intent::Swipe {
                photo: PhotoId(3),
                decision: Disposition::Trash
            }
        );
        assert_eq!(intents[3].name(), "swipe_keep_to_album");
        assert_eq!(
            intents[4],
            Intent::ConfirmDelete {
                token: None,
                confirmed: false
            }
        );
        assert_eq!(intents[5], Intent::Undo);
    }

    #[test]
    fn test_outcome_json_keeps_batch_fields() {
        let outcome = IntentOutcome::Batch {
            outcome: BatchOutcome {
                succeeded: vec![PhotoId(1)],
                failed: Vec::new(),
            },
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["event"], "batch");
        assert_eq!(json["outcome"]["succeeded"], serde_json::json!([1]));
        assert_eq!(json["outcome"]["failed"], serde_json::json!([]));

        let json = serde_json::to_value(IntentOutcome::DeleteAwaitingConfirmation {
            token: "delete-1".to_string(),
            count: 2,
        })
        .unwrap();
        assert_eq!(json["event"], "delete_awaiting_confirmation");
        assert_eq!(json["count"], 2);
    }

    #[test]
    fn test_unknown_intent_is_rejected() {
        let result: Result<Intent, _> = serde_json::from_str(r#"{"intent": "shake"}"#);
        assert!(result.is_err());
    }
}
