// Playback module
// Guided replay of a recorded sequence, proximity hysteresis and scoring

pub mod guided;
pub mod scoring;
pub mod targets;

pub use guided::{GuidedPlayback, PlaybackConfig, PlaybackState, StepView, TargetView};
pub use scoring::{FrameTally, Grade, ScoreResult, ScoringConfig, ScoringEngine};
pub use targets::{
    advance_ready, classify, Classification, EvaluationTarget, Observation, RenderHandle,
    TargetBinding,
};
