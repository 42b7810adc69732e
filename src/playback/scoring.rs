// Exercise scoring
// Converts active time and per-frame classification tallies into a 0-100 score and grade

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::targets::Classification;

/// Scoring weights and goal time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Target completion time in seconds (finishing faster earns no extra points)
    pub goal_seconds: f32,

    /// Maximum points from completion time
    pub time_weight: f32,

    /// Maximum points from accuracy
    pub accuracy_weight: f32,

    /// Lower bound on elapsed time to avoid dividing by zero
    pub epsilon: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            goal_seconds: 90.0,
            time_weight: 70.0,
            accuracy_weight: 30.0,
            epsilon: 0.001,
        }
    }
}

/// Frame counts accumulated over a whole playback session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameTally {
    pub green: u32,
    pub yellow: u32,
    pub red: u32,

    /// Times a target dropped out of Near after at least one Near frame
    pub miss_resets: u32,
}

impl FrameTally {
    pub fn record(&mut self, class: Classification) {
        match class {
            Classification::Near => self.green += 1,
            Classification::Marginal => self.yellow += 1,
            Classification::Far => self.red += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.green + self.yellow + self.red
    }

    /// Near counts fully, Marginal counts half. Zero when nothing was classified.
    pub fn accuracy(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.green as f32 + 0.5 * self.yellow as f32) / total as f32
    }
}

/// Letter grade derived from the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: f32) -> Self {
        if score >= 90.0 {
            Grade::S
        } else if score >= 80.0 {
            Grade::A
        } else if score >= 70.0 {
            Grade::B
        } else if score >= 60.0 {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn to_string(&self) -> &'static str {
        match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "S" => Some(Grade::S),
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "D" => Some(Grade::D),
            _ => None,
        }
    }
}

/// Final outcome of one guided playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Active time in seconds (pauses excluded)
    pub elapsed_secs: f32,

    /// Weighted accuracy ratio [0.0, 1.0]
    pub accuracy: f32,

    /// Carried for reporting; does not affect `score`
    pub miss_resets: u32,

    pub time_score: f32,
    pub accuracy_score: f32,

    /// Final score [0.0, 100.0]
    pub score: f32,
    pub grade: Grade,

    pub tally: FrameTally,
}

pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new() -> Self {
        ScoringEngine {
            config: ScoringConfig::default(),
        }
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        ScoringEngine { config }
    }

    pub fn score(&self, tally: &FrameTally, elapsed_active: Duration) -> ScoreResult {
        let elapsed_secs = elapsed_active.as_secs_f32();
        let accuracy = tally.accuracy();

        let time_ratio = self.config.goal_seconds / elapsed_secs.max(self.config.epsilon);
        let time_score = self.config.time_weight * time_ratio.clamp(0.0, 1.0);
        let accuracy_score = self.config.accuracy_weight * accuracy;

        // miss_resets intentionally carries no penalty
        let score = (time_score + accuracy_score).clamp(0.0, 100.0);

        ScoreResult {
            elapsed_secs,
            accuracy,
            miss_resets: tally.miss_resets,
            time_score,
            accuracy_score,
            score,
            grade: Grade::from_score(score),
            tally: *tally,
        }
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}
