//! Photo, album and disposition types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier of a photo in the device library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(pub i64);

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an album (a bucket the album store knows how to resolve).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub String);

impl AlbumId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a file created by an album copy, needed to undo the copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(pub String);

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Triage outcome of a photo.
///
/// Every photo has exactly one disposition. Any disposition may move to any
/// other; permanent deletion removes the record instead of transitioning it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    #[default]
    Unsorted,
    Keep,
    Maybe,
    Trash,
}

impl Disposition {
    pub const ALL: [Disposition; 4] = [
        Disposition::Unsorted,
        Disposition::Keep,
        Disposition::Maybe,
        Disposition::Trash,
    ];

    /// Whether a session outcome set exists for this disposition.
    pub fn is_session_tracked(&self) -> bool {
        !matches!(self, Disposition::Unsorted)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Unsorted => write!(f, "unsorted"),
            Disposition::Keep => write!(f, "keep"),
            Disposition::Maybe => write!(f, "maybe"),
            Disposition::Trash => write!(f, "trash"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid disposition '{0}'. Valid values: unsorted, keep, maybe, trash")]
pub struct ParseDispositionError(String);

impl std::str::FromStr for Disposition {
    type Err = ParseDispositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unsorted" => Ok(Disposition::Unsorted),
            "keep" => Ok(Disposition::Keep),
            "maybe" => Ok(Disposition::Maybe),
            "trash" => Ok(Disposition::Trash),
            _ => Err(ParseDispositionError(s.to_string())),
        }
    }
}

/// A photo as held by the photo status store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: PhotoId,
    #[serde(default)]
    pub disposition: Disposition,
    /// Album the photo currently belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<AlbumId>,
    /// Platform content URI, handed to the system deleter
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub imported_at: DateTime<Utc>,
}

impl PhotoRecord {
    pub fn new(id: i64, uri: impl Into<String>) -> Self {
        Self {
            id: PhotoId(id),
            disposition: Disposition::Unsorted,
            album: None,
            uri: uri.into(),
            captured_at: None,
            imported_at: Utc::now(),
        }
    }

    pub fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self
    }

    pub fn in_album(mut self, album: AlbumId) -> Self {
        self.album = Some(album);
        self
    }
}

/// An album offered as a classification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    #[serde(default)]
    pub photo_count: usize,
}

impl Album {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: AlbumId::new(id),
            name: name.into(),
            photo_count: 0,
        }
    }
}

/// Narrows which unsorted photos the swipe stage works through.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "album", rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    All,
    /// Only photos that currently belong to the given album
    Album(AlbumId),
    /// Only photos that belong to no album
    Unfiled,
}

impl FilterMode {
    pub fn matches(&self, photo: &PhotoRecord) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Album(id) => photo.album.as_ref() == Some(id),
            FilterMode::Unfiled => photo.album.is_none(),
        }
    }
}

/// Quota status of a session launched in daily-task mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTaskStatus {
    pub target: u32,
    pub current: u32,
}

impl DailyTaskStatus {
    /// Photos still owed today, never negative.
    pub fn remaining(&self) -> u32 {
        self.target.saturating_sub(self.current)
    }

    /// Cap a raw unsorted count at what is left of today's quota.
    pub fn clamp(&self, raw_unsorted: usize) -> usize {
        raw_unsorted.min(self.remaining() as usize)
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_from_str() {
        assert_eq!("keep".parse::<Disposition>().unwrap(), Disposition::Keep);
        assert_eq!("TRASH".parse::<Disposition>().unwrap(), Disposition::Trash);
        assert!("discard".parse::<Disposition>().is_err());
    }

    #[test]
    fn test_disposition_serde_is_lowercase() {
        let json = serde_json::to_string(&Disposition::Maybe).unwrap();
        assert_eq!(json, "\"maybe\"");
    }

    #[test]
    fn test_only_unsorted_is_untracked() {
        let tracked: Vec<_> = Disposition::ALL
            .iter()
            .filter(|d| d.is_session_tracked())
            .collect();
        assert_eq!(tracked.len(), 3);
        assert!(!Disposition::Unsorted.is_session_tracked());
    }

    #[test]
    fn test_filter_mode_matches() {
        let filed = PhotoRecord::new(1, "content://1").in_album(AlbumId::new("cam"));
        let loose = PhotoRecord::new(2, "content://2");

        assert!(FilterMode::All.matches(&filed));
        assert!(FilterMode::Album(AlbumId::new("cam")).matches(&filed));
        assert!(!FilterMode::Album(AlbumId::new("cam")).matches(&loose));
        assert!(FilterMode::Unfiled.matches(&loose));
        assert!(!FilterMode::Unfiled.matches(&filed));
    }

    #[test]
    fn test_daily_task_clamp() {
        let status = DailyTaskStatus {
            target: 10,
            current: 7,
        };
        assert_eq!(status.remaining(), 3);
        assert_eq!(status.clamp(50), 3);
        assert_eq!(status.clamp(2), 2);
    }

    #[test]
    fn test_daily_task_overshoot_never_negative() {
        let status = DailyTaskStatus {
            target: 5,
            current: 9,
        };
        assert_eq!(status.remaining(), 0);
        assert_eq!(status.clamp(100), 0);
        assert!(status.is_complete());
    }
}
