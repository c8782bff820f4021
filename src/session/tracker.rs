//! Session outcome tracking.
//!
//! The library-wide disposition of a photo says nothing about *when* it was
//! assigned. The tracker remembers the photos touched during the running
//! session so that COMPARE, CLASSIFY and TRASH only ever show this session's
//! work.

use photosweep_common::{Disposition, PhotoId};
use std::collections::BTreeSet;
use std::sync::Arc;

/// The three per-session outcome sets.
///
/// Each set sits behind an `Arc` and is replaced copy-on-write, so a snapshot
/// handed to a reader is never observed half-updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOutcomeSets {
    pub keep: Arc<BTreeSet<PhotoId>>,
    pub maybe: Arc<BTreeSet<PhotoId>>,
    pub trash: Arc<BTreeSet<PhotoId>>,
}

impl SessionOutcomeSets {
    /// The set backing a disposition, if the disposition is tracked.
    pub fn set_for(&self, disposition: Disposition) -> Option<&BTreeSet<PhotoId>> {
        match disposition {
            Disposition::Keep => Some(&self.keep),
            Disposition::Maybe => Some(&self.maybe),
            Disposition::Trash => Some(&self.trash),
            Disposition::Unsorted => None,
        }
    }

    /// Which set currently holds the photo.
    pub fn membership(&self, photo: PhotoId) -> Option<Disposition> {
        if self.keep.contains(&photo) {
            Some(Disposition::Keep)
        } else if self.maybe.contains(&photo) {
            Some(Disposition::Maybe)
        } else if self.trash.contains(&photo) {
            Some(Disposition::Trash)
        } else {
            None
        }
    }

    /// Total membership across all three sets.
    pub fn total(&self) -> usize {
        self.keep.len() + self.maybe.len() + self.trash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Check that no photo sits in two sets at once.
    pub fn is_disjoint(&self) -> bool {
        self.keep.is_disjoint(&self.maybe)
            && self.keep.is_disjoint(&self.trash)
            && self.maybe.is_disjoint(&self.trash)
    }

    fn set_mut(&mut self, disposition: Disposition) -> Option<&mut BTreeSet<PhotoId>> {
        match disposition {
            Disposition::Keep => Some(Arc::make_mut(&mut self.keep)),
            Disposition::Maybe => Some(Arc::make_mut(&mut self.maybe)),
            Disposition::Trash => Some(Arc::make_mut(&mut self.trash)),
            Disposition::Unsorted => None,
        }
    }
}

/// Records which photos were assigned which disposition this session.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    sets: SessionOutcomeSets,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a photo into the set of its new disposition.
    ///
    /// The photo leaves whichever set held it before. UNSORTED removes the
    /// photo without re-adding it. Returns the previous membership.
    pub fn record_disposition(
        &mut self,
        photo: PhotoId,
        new_disposition: Disposition,
    ) -> Option<Disposition> {
        let previous = self.remove(photo);
        if let Some(set) = self.sets.set_mut(new_disposition) {
            set.insert(photo);
        }
        previous
    }

    /// Inverse of `record_disposition`: drop the photo from the set of the
    /// disposition being undone. Returns whether the photo was there.
    pub fn undo_disposition(&mut self, photo: PhotoId, reverted: Disposition) -> bool {
        if self.sets.membership(photo) != Some(reverted) {
            return false;
        }
        self.sets
            .set_mut(reverted)
            .is_some_and(|set| set.remove(&photo))
    }

    /// Remove a photo from every set (restore or permanent delete).
    pub fn remove(&mut self, photo: PhotoId) -> Option<Disposition> {
        let current = self.sets.membership(photo)?;
        if let Some(set) = self.sets.set_mut(current) {
            set.remove(&photo);
        }
        Some(current)
    }

    /// Forget everything; called when a new session starts.
    pub fn reset(&mut self) {
        self.sets = SessionOutcomeSets::default();
    }

    /// Cheap copy of the current sets for readers.
    pub fn snapshot(&self) -> SessionOutcomeSets {
        self.sets.clone()
    }

    pub fn sets(&self) -> &SessionOutcomeSets {
        &self.sets
    }

    pub fn keep(&self) -> &BTreeSet<PhotoId> {
        &self.sets.keep
    }

    pub fn maybe(&self) -> &BTreeSet<PhotoId> {
        &self.sets.maybe
    }

    pub fn trash(&self) -> &BTreeSet<PhotoId> {
        &self.sets.trash
    }

    pub fn contains(&self, photo: PhotoId) -> bool {
        self.sets.membership(photo).is_some()
    }
}
