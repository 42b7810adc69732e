// Data models for exercise result history
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hand::Handedness;
use crate::playback::Grade;

/// One finished guided playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseResult {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub exercise_id: u32,
    pub handedness: Handedness,

    /// Hash of the sequence file that was played, when known
    pub sequence_sha256: Option<String>,
    pub steps: u32,

    pub score: f32,
    pub grade: Grade,
    pub elapsed_secs: f32,
    pub accuracy: f32,
    pub miss_resets: u32,

    pub green_frames: u32,
    pub yellow_frames: u32,
    pub red_frames: u32,
}

/// Aggregate view of one (exercise, hand) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSummary {
    pub exercise_id: u32,
    pub handedness: Handedness,
    pub attempts: u32,
    pub best_score: f32,
    pub last_played: DateTime<Utc>,
}
