//! Shared domain types for the photosweep workflow engine.
//!
//! This crate holds everything the engine and its collaborators have to agree
//! on: photo and album identity, the disposition vocabulary, and the async
//! contracts of the photo store, album store, system delete confirmation and
//! preference sources.

pub mod collaborators;
pub mod error;
pub mod photo;

pub use collaborators::{
    AlbumStore, ConfirmationHandle, MediaDeleter, PhotoStatusStore, Preferences,
};
pub use error::StoreError;
pub use photo::{
    Album, AlbumId, ArtifactRef, DailyTaskStatus, Disposition, FilterMode, PhotoId, PhotoRecord,
};
