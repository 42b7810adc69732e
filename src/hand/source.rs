// Live joint source contract and tracking readiness
// The host feeds per-frame joint poses; this module never talks to a device

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::frame::RigidTransform;
use super::joints::{Handedness, JointId};
use super::pose::Pose;
use crate::session::timing::serde_secs;

/// Per-frame joint pose provider.
///
/// Poses are reported in tracking space. `None` means the joint could
/// not be read this frame, which is different from a zero pose.
pub trait JointSource {
    /// Whether the tracking subsystem is up and producing frames
    fn is_running(&self) -> bool;

    fn joint_pose(&self, handedness: Handedness, joint: JointId) -> Option<Pose>;
}

/// Tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// How long to wait for the subsystem to report running
    #[serde(with = "serde_secs")]
    pub ready_timeout: Duration,

    /// Tracking space -> world space
    pub origin: RigidTransform,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            ready_timeout: Duration::from_secs(5),
            origin: RigidTransform::identity(),
        }
    }
}

/// Reads one joint and maps it into world space
pub fn read_world_pose(
    source: &dyn JointSource,
    origin: &RigidTransform,
    handedness: Handedness,
    joint: JointId,
) -> Option<Pose> {
    if !source.is_running() {
        return None;
    }
    let tracking = source.joint_pose(handedness, joint)?;
    if !tracking.is_finite() {
        return None;
    }
    Some(origin.transform_pose(&tracking))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Waiting,
    Ready,
    TimedOut,
}

/// Waits, one tick at a time, for the tracking subsystem to come up
#[derive(Debug, Clone)]
pub struct TrackingGate {
    timeout: Duration,
    elapsed: Duration,
    status: GateStatus,
}

impl TrackingGate {
    pub fn new(timeout: Duration) -> Self {
        TrackingGate {
            timeout,
            elapsed: Duration::ZERO,
            status: GateStatus::Waiting,
        }
    }

    /// Advance the wait by one frame. Ready and TimedOut are sticky until `reset`.
    pub fn poll(&mut self, dt: Duration, source: &dyn JointSource) -> GateStatus {
        if self.status != GateStatus::Waiting {
            return self.status;
        }

        if source.is_running() {
            log::info!("Hand tracking ready after {:.2}s", self.elapsed.as_secs_f32());
            self.status = GateStatus::Ready;
            return self.status;
        }

        self.elapsed += dt;
        if self.elapsed >= self.timeout {
            log::error!(
                "Hand tracking not available (timeout after {:.1}s)",
                self.timeout.as_secs_f32()
            );
            self.status = GateStatus::TimedOut;
        }

        self.status
    }

    pub fn status(&self) -> GateStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == GateStatus::Ready
    }

    /// Cancel any wait and start over
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.status = GateStatus::Waiting;
    }
}
