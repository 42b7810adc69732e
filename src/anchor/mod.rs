// Anchor module
// Establishes and holds the frozen reference frame for a session

pub mod lock;

pub use lock::{AnchorConfig, AnchorLock, AnchorState};
