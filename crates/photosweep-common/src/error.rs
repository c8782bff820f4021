//! Errors raised at the collaborator boundary.

use thiserror::Error;

use crate::photo::PhotoId;

/// Failure reported by a store, album backend or the system deleter.
///
/// These are the "transient I/O" class of failures: the engine reports them
/// per item and never lets them abort a batch or move the workflow stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Photo {0} not found")]
    NotFound(PhotoId),

    #[error("Artifact '{0}' no longer exists")]
    ArtifactMissing(String),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Operation rejected: {0}")]
    Rejected(String),

    #[error("Store unavailable")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_carries_id() {
        let err = StoreError::NotFound(PhotoId(42));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_store_error_implements_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::Unavailable);
    }
}
