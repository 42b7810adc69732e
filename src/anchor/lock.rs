// Anchor locking
// Freezes a wrist-anchored reference frame after a cancellable countdown

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GuidanceError, GuidanceResult};
use crate::hand::{read_world_pose, AnchorFrame, Handedness, JointId, JointSource, Pose, RigidTransform};
use crate::session::notify::{Notification, NotificationQueue};
use crate::session::timing::{serde_secs, Countdown};

/// Configuration for the anchor lock
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub handedness: Handedness,

    /// Hold time before the candidate pose is committed
    #[serde(with = "serde_secs")]
    pub countdown: Duration,

    /// How long the start message stays up after commit
    #[serde(with = "serde_secs")]
    pub start_flash: Duration,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig {
            handedness: Handedness::Right,
            countdown: Duration::from_secs(3),
            start_flash: Duration::from_millis(700),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorState {
    Idle,
    CountdownPending,
    Locked,
}

pub struct AnchorLock {
    config: AnchorConfig,

    /// Tracking space -> world space
    origin: RigidTransform,

    state: AnchorState,
    candidate: Option<Pose>,
    countdown: Option<Countdown>,
    frame: Option<AnchorFrame>,
}

impl AnchorLock {
    pub fn new(config: AnchorConfig, origin: RigidTransform) -> Self {
        AnchorLock {
            config,
            origin,
            state: AnchorState::Idle,
            candidate: None,
            countdown: None,
            frame: None,
        }
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == AnchorState::Locked
    }

    /// The committed frame, only while locked
    pub fn frame(&self) -> Option<&AnchorFrame> {
        self.frame.as_ref()
    }

    pub fn handedness(&self) -> Handedness {
        self.config.handedness
    }

    /// Begin a lock attempt from the current wrist pose.
    ///
    /// Only acts from Idle; while counting down or locked it is a no-op.
    /// A failed wrist read leaves the lock Idle and reports why.
    pub fn start(
        &mut self,
        source: &dyn JointSource,
        notify: &mut NotificationQueue,
    ) -> GuidanceResult<()> {
        match self.state {
            AnchorState::Idle => {}
            AnchorState::CountdownPending => {
                log::debug!("Anchor countdown already running, start ignored");
                return Ok(());
            }
            AnchorState::Locked => {
                log::debug!("Anchor already locked, start ignored");
                return Ok(());
            }
        }

        if !source.is_running() {
            log::error!("Anchor start: hand tracking subsystem is not running");
            notify.push(Notification::LockCancelled);
            return Err(GuidanceError::TrackingUnavailable);
        }

        let Some(wrist) = self.read_wrist(source) else {
            log::warn!("Anchor start: wrist pose not available");
            notify.push(Notification::LockCancelled);
            return Err(GuidanceError::NoFrameAvailable);
        };

        self.candidate = Some(wrist);
        self.countdown = Some(Countdown::seconds(self.config.countdown));
        self.state = AnchorState::CountdownPending;

        log::info!(
            "Anchor candidate at ({:.3}, {:.3}, {:.3}), counting down {:.1}s",
            wrist.position.x,
            wrist.position.y,
            wrist.position.z,
            self.config.countdown.as_secs_f32()
        );
        notify.push(Notification::AnchorCandidate { pose: wrist });

        Ok(())
    }

    /// Advance the countdown by one frame. Returns the frame on the tick it commits.
    pub fn tick(
        &mut self,
        dt: Duration,
        source: &dyn JointSource,
        notify: &mut NotificationQueue,
    ) -> Option<AnchorFrame> {
        if self.state != AnchorState::CountdownPending {
            return None;
        }

        if self.read_wrist(source).is_none() {
            log::warn!("Tracking lost during anchor countdown, lock cancelled");
            self.cancel(notify);
            return None;
        }

        let total = self.config.countdown;
        let tick = self
            .countdown
            .get_or_insert_with(|| Countdown::seconds(total))
            .tick(dt);
        if let Some(count) = tick.shown {
            notify.push(Notification::Countdown { count });
        }

        if !tick.finished {
            return None;
        }

        let Some(candidate) = self.candidate.take() else {
            self.cancel(notify);
            return None;
        };

        match self.lock_now_at(&candidate) {
            Ok(frame) => {
                notify.push(Notification::AnchorLocked { frame });
                notify.push(Notification::flash("EXERCISE START!", self.config.start_flash));
                Some(frame)
            }
            Err(e) => {
                log::error!("Anchor commit failed: {}", e);
                self.cancel(notify);
                None
            }
        }
    }

    /// Drop the lock and any pending attempt (session end)
    pub fn reset(&mut self) {
        if self.state != AnchorState::Idle {
            log::info!("Anchor reset");
        }
        self.state = AnchorState::Idle;
        self.candidate = None;
        self.countdown = None;
        self.frame = None;
    }

    fn lock_now_at(&mut self, candidate: &Pose) -> GuidanceResult<AnchorFrame> {
        if !candidate.is_finite() {
            return Err(GuidanceError::ConfigurationMissing(
                "anchor candidate pose is not finite".to_string(),
            ));
        }

        let frame = RigidTransform::from_pose(candidate);
        self.frame = Some(frame);
        self.countdown = None;
        self.state = AnchorState::Locked;

        log::info!("Anchor locked");
        Ok(frame)
    }

    fn cancel(&mut self, notify: &mut NotificationQueue) {
        self.state = AnchorState::Idle;
        self.candidate = None;
        self.countdown = None;
        notify.push(Notification::LockCancelled);
        notify.push(Notification::HideText);
    }

    fn read_wrist(&self, source: &dyn JointSource) -> Option<Pose> {
        read_world_pose(source, &self.origin, self.config.handedness, JointId::Wrist)
    }
}
