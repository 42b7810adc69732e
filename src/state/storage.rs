// File system storage for pose sequences
// One pretty-printed JSON document per (exercise, hand), always rewritten whole
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::capture::PoseSequence;
use crate::hand::Handedness;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt pose sequence at {path:?}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid pose sequence at {path:?}: {reason}")]
    InvalidSequence { path: PathBuf, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Get the app data directory for handguide
pub fn get_app_data_dir() -> StoreResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StoreError::NoAppDataDir)?;
    let app_dir = data_dir.join("com.handguide.app");
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Outcome of a successful save
#[derive(Debug, Clone, Serialize)]
pub struct SavedSequence {
    pub path: PathBuf,
    pub sha256: String,
    pub steps: usize,
}

/// Load/save of pose sequences under `<root>/poses`
#[derive(Debug, Clone)]
pub struct SequenceStore {
    root: PathBuf,
}

impl SequenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SequenceStore { root: root.into() }
    }

    /// Store rooted at the platform app data directory
    pub fn open_default() -> StoreResult<Self> {
        Ok(SequenceStore::new(get_app_data_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn poses_dir(&self) -> PathBuf {
        self.root.join("poses")
    }

    pub fn path_for(&self, exercise_id: u32, handedness: Handedness) -> PathBuf {
        self.poses_dir().join(format!(
            "{}_handpose_sequence_{}.json",
            exercise_id,
            handedness.suffix()
        ))
    }

    pub fn exists(&self, exercise_id: u32, handedness: Handedness) -> bool {
        self.path_for(exercise_id, handedness).is_file()
    }

    /// Load a sequence. A missing file is an empty sequence; a file that
    /// cannot be parsed is an error, never an empty sequence.
    pub fn load(&self, exercise_id: u32, handedness: Handedness) -> StoreResult<PoseSequence> {
        let path = self.path_for(exercise_id, handedness);
        if !path.exists() {
            log::info!("No pose sequence at {:?}, starting empty", path);
            return Ok(PoseSequence::empty(handedness));
        }

        let contents = fs::read_to_string(&path)?;
        let sequence: PoseSequence = serde_json::from_str(&contents).map_err(|source| {
            log::error!("Failed to parse pose sequence {:?}: {}", path, source);
            StoreError::DeserializationFailed {
                path: path.clone(),
                source,
            }
        })?;

        sequence
            .validate()
            .map_err(|reason| StoreError::InvalidSequence {
                path: path.clone(),
                reason,
            })?;

        if sequence.handedness != handedness {
            log::error!(
                "Sequence {:?} recorded as {} hand, expected {}",
                path,
                sequence.handedness.to_string(),
                handedness.to_string()
            );
            return Err(StoreError::InvalidSequence {
                path,
                reason: format!(
                    "recorded for {} hand, stored as {}",
                    sequence.handedness.to_string(),
                    handedness.to_string()
                ),
            });
        }

        log::info!("Loaded {} steps from {:?}", sequence.len(), path);
        Ok(sequence)
    }

    /// Atomically replace the stored sequence for (exercise, sequence.handedness)
    pub fn save(&self, exercise_id: u32, sequence: &PoseSequence) -> StoreResult<SavedSequence> {
        let path = self.path_for(exercise_id, sequence.handedness);
        let dir = self.poses_dir();
        fs::create_dir_all(&dir)?;

        let data = serde_json::to_vec_pretty(sequence)?;

        // Write next to the target and rename so a crash never leaves a partial file
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        let sha256 = calculate_sha256(&data);
        log::debug!("Saved {} steps to {:?} ({})", sequence.len(), path, sha256);

        Ok(SavedSequence {
            path,
            sha256,
            steps: sequence.len(),
        })
    }

    /// Replace the stored sequence with an empty one
    pub fn clear(&self, exercise_id: u32, handedness: Handedness) -> StoreResult<SavedSequence> {
        let saved = self.save(exercise_id, &PoseSequence::empty(handedness))?;
        log::info!("Cleared sequence: {:?}", saved.path);
        Ok(saved)
    }

    /// SHA256 of the stored file, if present
    pub fn sequence_sha256(
        &self,
        exercise_id: u32,
        handedness: Handedness,
    ) -> StoreResult<Option<String>> {
        let path = self.path_for(exercise_id, handedness);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(calculate_sha256(&fs::read(&path)?)))
    }
}
