// Crate-wide error taxonomy
// Per-operation failures surface as GuidanceError; per-joint failures never reach here

use thiserror::Error;

use crate::state::{DbError, StoreError};

#[derive(Debug, Error)]
pub enum GuidanceError {
    /// Tracking subsystem not running (transient, retry within the readiness timeout)
    #[error("Hand tracking is unavailable")]
    TrackingUnavailable,

    /// A required joint could not be read this frame
    #[error("No tracking frame available")]
    NoFrameAvailable,

    #[error("Anchor is not locked")]
    AnchorNotLocked,

    /// Persisted sequence exists but could not be parsed
    #[error("Failed to deserialize pose sequence at {path}: {reason}")]
    DeserializationFailed { path: String, reason: String },

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error(transparent)]
    Storage(StoreError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<StoreError> for GuidanceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::DeserializationFailed { path, source } => {
                GuidanceError::DeserializationFailed {
                    path: path.to_string_lossy().to_string(),
                    reason: source.to_string(),
                }
            }
            StoreError::InvalidSequence { path, reason } => GuidanceError::DeserializationFailed {
                path: path.to_string_lossy().to_string(),
                reason,
            },
            other => GuidanceError::Storage(other),
        }
    }
}

pub type GuidanceResult<T> = Result<T, GuidanceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_corrupt_store_maps_to_deserialization_failed() {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: GuidanceError = StoreError::DeserializationFailed {
            path: PathBuf::from("/tmp/3_handpose_sequence_R.json"),
            source,
        }
        .into();

        match err {
            GuidanceError::DeserializationFailed { path, .. } => {
                assert!(path.ends_with("3_handpose_sequence_R.json"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_io_error_stays_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: GuidanceError = StoreError::Io(io).into();
        assert!(matches!(err, GuidanceError::Storage(_)));
    }
}
