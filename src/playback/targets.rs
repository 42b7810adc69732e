// Evaluation targets and proximity hysteresis
// Per-frame Near/Marginal/Far classification and consecutive-Near counters

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::scoring::FrameTally;
use crate::hand::JointId;

/// Proximity bucket of a live joint relative to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    /// Within `radius` (shown green)
    Near,
    /// Within `marginal_factor * radius` (shown yellow)
    Marginal,
    /// Anything further, or no live read (shown red)
    Far,
}

impl Classification {
    pub fn color_name(&self) -> &'static str {
        match self {
            Classification::Near => "green",
            Classification::Marginal => "yellow",
            Classification::Far => "red",
        }
    }
}

pub fn classify(distance: f32, radius: f32, marginal_factor: f32) -> Classification {
    if distance <= radius {
        Classification::Near
    } else if distance <= radius * marginal_factor {
        Classification::Marginal
    } else {
        Classification::Far
    }
}

/// Opaque host handle for a renderable/collidable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderHandle(pub u64);

/// Host-supplied target setup: which joint, how close, and what to draw it with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetBinding {
    pub joint: JointId,

    /// Acceptance radius in meters
    #[serde(default = "default_radius")]
    pub radius: f32,

    /// Missing handle means the target failed to set up and is never evaluated
    #[serde(default)]
    pub handle: Option<RenderHandle>,
}

fn default_radius() -> f32 {
    0.02
}

impl TargetBinding {
    pub fn new(joint: JointId, handle: RenderHandle) -> Self {
        TargetBinding {
            joint,
            radius: default_radius(),
            handle: Some(handle),
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }
}

/// What one frame of evaluation did to a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Bucket for a successful live read; None when the joint was not tracked
    pub classification: Option<Classification>,

    /// Color the target should show
    pub visual: Classification,

    /// This frame broke a Near streak
    pub miss_reset: bool,
}

#[derive(Debug, Clone)]
pub struct EvaluationTarget {
    pub joint: JointId,
    pub radius: f32,
    pub handle: Option<RenderHandle>,

    /// Current target position in world space
    pub position: Option<Vector3<f32>>,

    /// Consecutive Near frames
    pub ok_frames: u32,

    /// Last color sent to the renderer
    pub visual: Option<Classification>,
}

impl EvaluationTarget {
    pub fn from_binding(binding: &TargetBinding) -> Self {
        EvaluationTarget {
            joint: binding.joint,
            radius: binding.radius,
            handle: binding.handle,
            position: None,
            ok_frames: 0,
            visual: None,
        }
    }

    /// Set up correctly and has a position to aim at
    pub fn is_valid(&self) -> bool {
        self.handle.is_some() && self.position.is_some()
    }

    /// Classify one live read, update the Near streak and the session tally
    pub fn observe(
        &mut self,
        live: Option<&Vector3<f32>>,
        marginal_factor: f32,
        tally: &mut FrameTally,
    ) -> Observation {
        let (Some(live), Some(target)) = (live, self.position.as_ref()) else {
            self.ok_frames = 0;
            return Observation {
                classification: None,
                visual: Classification::Far,
                miss_reset: false,
            };
        };

        let distance = (live - target).norm();
        let class = classify(distance, self.radius, marginal_factor);
        tally.record(class);

        let mut miss_reset = false;
        if class == Classification::Near {
            self.ok_frames += 1;
        } else {
            if self.ok_frames > 0 {
                tally.miss_resets += 1;
                miss_reset = true;
            }
            self.ok_frames = 0;
        }

        Observation {
            classification: Some(class),
            visual: class,
            miss_reset,
        }
    }

    pub fn is_satisfied(&self, required_frames: u32) -> bool {
        self.ok_frames >= required_frames
    }

    /// Update the remembered color; true when it changed
    pub fn set_visual(&mut self, visual: Classification) -> bool {
        if self.visual == Some(visual) {
            return false;
        }
        self.visual = Some(visual);
        true
    }
}

/// Step advance policy.
///
/// With `required_all` every valid target must be satisfied; otherwise
/// one target may lag (but at least one must be satisfied).
pub fn advance_ready(satisfied: usize, valid: usize, required_all: bool) -> bool {
    if valid == 0 {
        return false;
    }
    if required_all {
        satisfied == valid
    } else {
        satisfied >= (valid - 1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: u32 = 15;

    fn target_at_origin() -> EvaluationTarget {
        let mut target =
            EvaluationTarget::from_binding(&TargetBinding::new(JointId::IndexTip, RenderHandle(1)));
        target.position = Some(Vector3::zeros());
        target
    }

    fn near() -> Vector3<f32> {
        Vector3::new(0.01, 0.0, 0.0)
    }

    fn marginal() -> Vector3<f32> {
        Vector3::new(0.025, 0.0, 0.0)
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(0.02, 0.02, 1.5), Classification::Near);
        assert_eq!(classify(0.021, 0.02, 1.5), Classification::Marginal);
        assert_eq!(classify(0.029, 0.02, 1.5), Classification::Marginal);
        assert_eq!(classify(0.031, 0.02, 1.5), Classification::Far);
    }

    #[test]
    fn test_one_frame_short_does_not_satisfy() {
        let mut target = target_at_origin();
        let mut tally = FrameTally::default();

        for _ in 0..REQUIRED - 1 {
            target.observe(Some(&near()), 1.5, &mut tally);
        }
        assert!(!target.is_satisfied(REQUIRED));

        let obs = target.observe(Some(&marginal()), 1.5, &mut tally);
        assert!(obs.miss_reset);
        assert!(!target.is_satisfied(REQUIRED));
        assert_eq!(target.ok_frames, 0);
    }

    #[test]
    fn test_required_streak_satisfies() {
        let mut target = target_at_origin();
        let mut tally = FrameTally::default();

        for _ in 0..REQUIRED {
            target.observe(Some(&near()), 1.5, &mut tally);
        }
        assert!(target.is_satisfied(REQUIRED));
        assert_eq!(tally.green, REQUIRED);
    }

    #[test]
    fn test_single_miss_resets_exactly_once() {
        let mut target = target_at_origin();
        let mut tally = FrameTally::default();

        for _ in 0..5 {
            target.observe(Some(&near()), 1.5, &mut tally);
        }
        target.observe(Some(&Vector3::new(1.0, 0.0, 0.0)), 1.5, &mut tally);
        assert_eq!(target.ok_frames, 0);
        assert_eq!(tally.miss_resets, 1);

        // Staying away does not keep counting resets
        target.observe(Some(&Vector3::new(1.0, 0.0, 0.0)), 1.5, &mut tally);
        assert_eq!(tally.miss_resets, 1);
        assert_eq!(tally.red, 2);
    }

    #[test]
    fn test_lost_tracking_zeroes_without_reset_or_tally() {
        let mut target = target_at_origin();
        let mut tally = FrameTally::default();

        for _ in 0..3 {
            target.observe(Some(&near()), 1.5, &mut tally);
        }
        let obs = target.observe(None, 1.5, &mut tally);

        assert_eq!(obs.classification, None);
        assert_eq!(obs.visual, Classification::Far);
        assert!(!obs.miss_reset);
        assert_eq!(target.ok_frames, 0);
        assert_eq!(tally.miss_resets, 0);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_validity_requires_handle_and_position() {
        let binding = TargetBinding {
            joint: JointId::ThumbTip,
            radius: 0.02,
            handle: None,
        };
        let mut target = EvaluationTarget::from_binding(&binding);
        target.position = Some(Vector3::zeros());
        assert!(!target.is_valid());

        let mut target =
            EvaluationTarget::from_binding(&TargetBinding::new(JointId::ThumbTip, RenderHandle(9)));
        assert!(!target.is_valid());
        target.position = Some(Vector3::zeros());
        assert!(target.is_valid());
    }

    #[test]
    fn test_advance_policy() {
        assert!(!advance_ready(2, 3, true));
        assert!(advance_ready(3, 3, true));

        assert!(advance_ready(2, 3, false));
        assert!(!advance_ready(1, 3, false));

        // One valid target still needs that one target
        assert!(!advance_ready(0, 1, false));
        assert!(advance_ready(1, 1, false));

        assert!(!advance_ready(0, 0, true));
        assert!(!advance_ready(0, 0, false));
    }

    #[test]
    fn test_binding_default_radius() {
        let binding: TargetBinding = serde_json::from_str(r#"{"joint": 11, "handle": 4}"#).unwrap();
        assert_eq!(binding.joint, JointId::IndexTip);
        assert_eq!(binding.radius, 0.02);
        assert_eq!(binding.handle, Some(RenderHandle(4)));
    }

    #[test]
    fn test_set_visual_reports_changes() {
        let mut target = target_at_origin();
        assert!(target.set_visual(Classification::Far));
        assert!(!target.set_visual(Classification::Far));
        assert!(target.set_visual(Classification::Near));
    }
}
