// Handguide - Anchor-locked hand pose capture and guided exercise playback
// Module declarations

pub mod anchor;
pub mod capture;
pub mod error;
pub mod hand;
pub mod playback;
pub mod session;
pub mod state;

pub use anchor::{AnchorConfig, AnchorLock, AnchorState};
pub use capture::{capture_snapshot, PoseRecorder, PoseSequence, PoseSnapshot};
pub use error::{GuidanceError, GuidanceResult};
pub use hand::{AnchorFrame, Handedness, JointId, JointSource, Pose, RigidTransform};
pub use playback::{GuidedPlayback, PlaybackConfig, PlaybackState, ScoreResult, ScoringEngine};
pub use session::{Notification, SessionConfig, SessionController, SessionMode};
pub use state::{DbConnection, SequenceStore};
