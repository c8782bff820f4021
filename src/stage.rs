//! Workflow stages and the active stage sequence.
//!
//! The sequence is not fixed: when albums are assigned while swiping, the
//! dedicated CLASSIFY stage has nothing to do and is left out.
//!
//! | classification on swipe | sequence                                   |
//! |-------------------------|--------------------------------------------|
//! | `false`                 | SWIPE → COMPARE → CLASSIFY → TRASH → VICTORY |
//! | `true`                  | SWIPE → COMPARE → TRASH → VICTORY          |
//!
//! VICTORY is terminal and never counted as a functional stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One phase of a sorting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Assign a disposition to each unsorted photo
    #[default]
    Swipe,
    /// Resolve the photos deferred as MAYBE this session
    Compare,
    /// File the photos kept this session into albums
    Classify,
    /// Restore or permanently delete the photos trashed this session
    Trash,
    /// Session finished
    Victory,
}

const WITH_CLASSIFY: &[WorkflowStage] = &[
    WorkflowStage::Swipe,
    WorkflowStage::Compare,
    WorkflowStage::Classify,
    WorkflowStage::Trash,
    WorkflowStage::Victory,
];

const WITHOUT_CLASSIFY: &[WorkflowStage] = &[
    WorkflowStage::Swipe,
    WorkflowStage::Compare,
    WorkflowStage::Trash,
    WorkflowStage::Victory,
];

impl WorkflowStage {
    /// Canonical order of every stage, regardless of configuration.
    pub const ALL: [WorkflowStage; 5] = [
        WorkflowStage::Swipe,
        WorkflowStage::Compare,
        WorkflowStage::Classify,
        WorkflowStage::Trash,
        WorkflowStage::Victory,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStage::Victory)
    }

    fn ordinal(&self) -> usize {
        match self {
            WorkflowStage::Swipe => 0,
            WorkflowStage::Compare => 1,
            WorkflowStage::Classify => 2,
            WorkflowStage::Trash => 3,
            WorkflowStage::Victory => 4,
        }
    }

    /// Text key of the stage title.
    pub fn title_key(&self) -> &'static str {
        match self {
            WorkflowStage::Swipe => "stage.swipe.title",
            WorkflowStage::Compare => "stage.compare.title",
            WorkflowStage::Classify => "stage.classify.title",
            WorkflowStage::Trash => "stage.trash.title",
            WorkflowStage::Victory => "stage.victory.title",
        }
    }

    /// Text key of the stage subtitle.
    pub fn subtitle_key(&self) -> &'static str {
        match self {
            WorkflowStage::Swipe => "stage.swipe.subtitle",
            WorkflowStage::Compare => "stage.compare.subtitle",
            WorkflowStage::Classify => "stage.classify.subtitle",
            WorkflowStage::Trash => "stage.trash.subtitle",
            WorkflowStage::Victory => "stage.victory.subtitle",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStage::Swipe => write!(f, "swipe"),
            WorkflowStage::Compare => write!(f, "compare"),
            WorkflowStage::Classify => write!(f, "classify"),
            WorkflowStage::Trash => write!(f, "trash"),
            WorkflowStage::Victory => write!(f, "victory"),
        }
    }
}

/// Get the active stage sequence, VICTORY included.
pub fn active_sequence(classification_on_swipe: bool) -> &'static [WorkflowStage] {
    if classification_on_swipe {
        WITHOUT_CLASSIFY
    } else {
        WITH_CLASSIFY
    }
}

/// Get the functional stages of the active sequence (VICTORY excluded).
pub fn functional_stages(classification_on_swipe: bool) -> &'static [WorkflowStage] {
    let all = active_sequence(classification_on_swipe);
    &all[..all.len() - 1]
}

/// Successor of `current` within the active sequence.
///
/// Works even when `current` is not part of the sequence, which happens if
/// the classification flag flips while the session sits in CLASSIFY: the
/// next stage in canonical order that the sequence contains is chosen.
pub fn next_stage(current: WorkflowStage, classification_on_swipe: bool) -> WorkflowStage {
    active_sequence(classification_on_swipe)
        .iter()
        .copied()
        .find(|stage| stage.ordinal() > current.ordinal())
        .unwrap_or(WorkflowStage::Victory)
}

/// Stage-level progress through the session, in `0.0..=1.0`.
pub fn stage_progress(stage: WorkflowStage, classification_on_swipe: bool) -> f32 {
    if stage.is_terminal() {
        return 1.0;
    }
    let functional = functional_stages(classification_on_swipe);
    let done = functional
        .iter()
        .filter(|s| s.ordinal() < stage.ordinal())
        .count();
    done as f32 / functional.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_with_classification_on_swipe_skips_classify() {
        let seq = active_sequence(true);
        assert_eq!(seq.len(), 4);
        assert_eq!(functional_stages(true).len(), 3);
        assert!(!seq.contains(&WorkflowStage::Classify));
    }

    #[test]
    fn test_sequence_without_classification_on_swipe_has_classify() {
        let seq = active_sequence(false);
        assert_eq!(functional_stages(false).len(), 4);
        assert!(seq.contains(&WorkflowStage::Classify));
    }

    #[test]
    fn test_victory_always_last() {
        for flag in [true, false] {
            assert_eq!(active_sequence(flag).last(), Some(&WorkflowStage::Victory));
            assert!(!functional_stages(flag).contains(&WorkflowStage::Victory));
        }
    }

    #[test]
    fn test_next_stage_follows_active_sequence() {
        assert_eq!(
            next_stage(WorkflowStage::Compare, false),
            WorkflowStage::Classify
        );
        assert_eq!(next_stage(WorkflowStage::Compare, true), WorkflowStage::Trash);
        assert_eq!(next_stage(WorkflowStage::Trash, true), WorkflowStage::Victory);
        assert_eq!(
            next_stage(WorkflowStage::Victory, false),
            WorkflowStage::Victory
        );
    }

    #[test]
    fn test_next_stage_from_stage_outside_sequence() {
        assert_eq!(
            next_stage(WorkflowStage::Classify, true),
            WorkflowStage::Trash
        );
    }

    #[test]
    fn test_stage_progress() {
        assert_eq!(stage_progress(WorkflowStage::Swipe, false), 0.0);
        assert_eq!(stage_progress(WorkflowStage::Classify, false), 0.5);
        assert!((stage_progress(WorkflowStage::Trash, true) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(stage_progress(WorkflowStage::Victory, true), 1.0);
    }

    #[test]
    fn test_text_keys_are_distinct() {
        let titles: std::collections::HashSet<_> =
            WorkflowStage::ALL.iter().map(|s| s.title_key()).collect();
        assert_eq!(titles.len(), WorkflowStage::ALL.len());
        assert_eq!(WorkflowStage::Trash.subtitle_key(), "stage.trash.subtitle");
    }
}
