// Capture module
// Turns the live hand into anchor-local snapshots and records them as a sequence

pub mod recorder;
pub mod snapshot;

pub use recorder::PoseRecorder;
pub use snapshot::{capture_snapshot, PoseSequence, PoseSnapshot};
