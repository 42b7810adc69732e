// Outbound notifications
// Text, countdown, per-target visuals and the terminal score event for the host UI

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

use super::timing::serde_secs;
use crate::hand::{AnchorFrame, JointId, Pose};
use crate::playback::{Classification, RenderHandle, ScoreResult, StepView};

/// Which control table the host should present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Recording,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Countdown digit to display
    Countdown { count: u32 },

    /// Short message shown for `duration`, then hidden
    Flash {
        message: String,
        #[serde(with = "serde_secs")]
        duration: Duration,
    },

    /// Hide any countdown or flash text
    HideText,

    /// Wrist pose the anchor will lock to if the countdown completes
    AnchorCandidate { pose: Pose },

    AnchorLocked { frame: AnchorFrame },

    LockCancelled,

    SessionState { state: SessionState },

    StepShown { view: StepView },

    /// Color change for one target
    TargetVisual {
        joint: JointId,
        handle: RenderHandle,
        classification: Classification,
    },

    StepCaptured { index: usize, steps: usize, path: String },

    SequenceCleared { path: String },

    /// An operation was refused or failed; nothing partial was applied
    OperationFailed { operation: String, error: String },

    TrackingUnavailable,

    /// Delivered once per playback session
    Finished { result: ScoreResult },
}

impl Notification {
    pub fn flash(message: impl Into<String>, duration: Duration) -> Self {
        Notification::Flash {
            message: message.into(),
            duration,
        }
    }

    pub fn failed(operation: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Notification::OperationFailed {
            operation: operation.into(),
            error: error.to_string(),
        }
    }
}

/// FIFO of notifications drained by the host once per frame
#[derive(Debug, Default)]
pub struct NotificationQueue {
    items: VecDeque<Notification>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        NotificationQueue::default()
    }

    pub fn push(&mut self, notification: Notification) {
        log::debug!("notify: {:?}", notification);
        self.items.push_back(notification);
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_drains_in_order() {
        let mut queue = NotificationQueue::new();
        queue.push(Notification::Countdown { count: 3 });
        queue.push(Notification::Countdown { count: 2 });
        queue.push(Notification::HideText);

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], Notification::Countdown { count: 3 });
        assert_eq!(drained[2], Notification::HideText);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_notification_json_shape() {
        let n = Notification::flash("PAUSED", Duration::from_millis(500));
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "flash");
        assert_eq!(value["message"], "PAUSED");
        assert_eq!(value["duration"], 0.5);

        let state = Notification::SessionState {
            state: SessionState::Recording,
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["state"], "recording");
    }

    #[test]
    fn test_failed_helper() {
        let n = Notification::failed("capture", "No tracking frame available");
        match n {
            Notification::OperationFailed { operation, error } => {
                assert_eq!(operation, "capture");
                assert_eq!(error, "No tracking frame available");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
