// Pose snapshots and sequences
// One snapshot = one step of a guided exercise, expressed in the anchor's frame

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::{GuidanceError, GuidanceResult};
use crate::hand::{
    parent_relative_rotation, read_world_pose, to_anchor_local, AnchorFrame, Handedness,
    JointId, JointPose, JointRot, JointSource, Pose, RigidTransform, SerializablePose,
    SerializableQuat, ALL_JOINTS, POSITION_TRACKED,
};

/// One recorded hand pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseSnapshot {
    /// Wrist pose, anchor-local
    pub wrist_pose: SerializablePose,

    /// Anchor-local poses of the position-tracked joints that were readable
    #[serde(default)]
    pub joint_poses: Vec<JointPose>,

    /// Parent-relative rotations (anchor-local for the wrist)
    #[serde(default)]
    pub joint_rots: Vec<JointRot>,
}

impl PoseSnapshot {
    pub fn position_of(&self, joint: JointId) -> Option<Vector3<f32>> {
        self.joint_poses
            .iter()
            .find(|jp| jp.joint_id == joint)
            .map(|jp| jp.pose.position.to_vector())
    }

    pub fn rotation_of(&self, joint: JointId) -> Option<UnitQuaternion<f32>> {
        self.joint_rots
            .iter()
            .find(|jr| jr.joint_id == joint)
            .map(|jr| jr.rotation.to_unit())
    }

    /// Recorded rotations keyed by joint
    pub fn local_rotations(&self) -> BTreeMap<JointId, UnitQuaternion<f32>> {
        self.joint_rots
            .iter()
            .map(|jr| (jr.joint_id, jr.rotation.to_unit()))
            .collect()
    }

    /// Joint ids must be unique within each list
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for jp in &self.joint_poses {
            if !seen.insert(jp.joint_id) {
                return Err(format!("duplicate joint pose for {}", jp.joint_id));
            }
        }

        seen.clear();
        for jr in &self.joint_rots {
            if !seen.insert(jr.joint_id) {
                return Err(format!("duplicate joint rotation for {}", jr.joint_id));
            }
        }

        Ok(())
    }
}

/// Ordered list of snapshots for one hand; insertion order is playback order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSequence {
    pub handedness: Handedness,

    #[serde(default)]
    pub steps: Vec<PoseSnapshot>,
}

impl PoseSequence {
    pub fn empty(handedness: Handedness) -> Self {
        PoseSequence {
            handedness,
            steps: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn validate(&self) -> Result<(), String> {
        for (i, step) in self.steps.iter().enumerate() {
            step.validate().map_err(|e| format!("step {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// Capture the live hand as one snapshot in the anchor's frame.
///
/// Fails only when the wrist cannot be read. Any other joint that cannot
/// be read is left out, and so is a joint whose parent cannot be read.
pub fn capture_snapshot(
    source: &dyn JointSource,
    origin: &RigidTransform,
    handedness: Handedness,
    anchor: &AnchorFrame,
) -> GuidanceResult<PoseSnapshot> {
    if !source.is_running() {
        return Err(GuidanceError::TrackingUnavailable);
    }

    let local: BTreeMap<JointId, Pose> = ALL_JOINTS
        .iter()
        .filter_map(|joint| {
            read_world_pose(source, origin, handedness, *joint)
                .map(|world| (*joint, to_anchor_local(&world, anchor)))
        })
        .collect();

    let wrist = local
        .get(&JointId::Wrist)
        .ok_or(GuidanceError::NoFrameAvailable)?;

    let joint_poses = POSITION_TRACKED
        .iter()
        .filter_map(|joint| {
            local.get(joint).map(|pose| JointPose {
                joint_id: *joint,
                pose: SerializablePose::from_pose(pose),
            })
        })
        .collect();

    let mut joint_rots = Vec::with_capacity(ALL_JOINTS.len());
    for joint in ALL_JOINTS {
        let Some(child) = local.get(&joint) else {
            continue;
        };

        let rotation = match joint.parent() {
            None => parent_relative_rotation(&child.rotation, None),
            Some(parent) => match local.get(&parent) {
                Some(parent_pose) => {
                    parent_relative_rotation(&child.rotation, Some(&parent_pose.rotation))
                }
                None => {
                    log::debug!("Skipping {}: parent {} not tracked", joint, parent);
                    continue;
                }
            },
        };

        joint_rots.push(JointRot {
            joint_id: joint,
            rotation: SerializableQuat::from_unit(&rotation),
        });
    }

    Ok(PoseSnapshot {
        wrist_pose: SerializablePose::from_pose(wrist),
        joint_poses,
        joint_rots,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::full_hand;
    use super::*;
    use crate::hand::compose_world_rotations;

    fn anchor() -> AnchorFrame {
        RigidTransform::new(
            Vector3::new(0.1, 1.0, 0.3),
            UnitQuaternion::from_euler_angles(0.0, 0.9, 0.1),
        )
    }

    #[test]
    fn test_full_capture_has_all_joints() {
        let source = full_hand(Vector3::zeros());
        let snap = capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &anchor())
            .unwrap();

        assert_eq!(snap.joint_poses.len(), 6);
        assert_eq!(snap.joint_rots.len(), 26);
        assert!(snap.validate().is_ok());
    }

    #[test]
    fn test_wrist_rotation_is_anchor_local() {
        let source = full_hand(Vector3::zeros());
        let a = anchor();
        let snap =
            capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &a).unwrap();

        let world_wrist = source.poses[&(Handedness::Right, JointId::Wrist)];
        let expected = a.rotation.inverse() * world_wrist.rotation;
        let recorded = snap.rotation_of(JointId::Wrist).unwrap();
        assert!(recorded.angle_to(&expected) < 1e-4);
    }

    #[test]
    fn test_rotations_rebuild_world_hierarchy() {
        let source = full_hand(Vector3::new(0.3, 0.9, 0.0));
        let a = anchor();
        let snap =
            capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &a).unwrap();

        let anchor_local = compose_world_rotations(&snap.local_rotations());
        for joint in ALL_JOINTS {
            let world = a.rotation * anchor_local[&joint];
            let expected = source.poses[&(Handedness::Right, joint)].rotation;
            assert!(world.angle_to(&expected) < 1e-3, "mismatch at {}", joint);
        }
    }

    #[test]
    fn test_missing_joint_is_omitted() {
        let mut source = full_hand(Vector3::zeros());
        source.remove(Handedness::Right, JointId::IndexTip);
        source.remove(Handedness::Right, JointId::RingIntermediate);

        let snap = capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &anchor())
            .unwrap();

        assert_eq!(snap.joint_poses.len(), 5);
        assert!(snap.position_of(JointId::IndexTip).is_none());
        assert!(snap.rotation_of(JointId::IndexTip).is_none());
        // Children of an untracked joint are dropped as well
        assert!(snap.rotation_of(JointId::RingIntermediate).is_none());
        assert!(snap.rotation_of(JointId::RingDistal).is_none());
        assert!(snap.rotation_of(JointId::RingProximal).is_some());
    }

    #[test]
    fn test_missing_wrist_fails() {
        let mut source = full_hand(Vector3::zeros());
        source.remove(Handedness::Right, JointId::Wrist);

        let err = capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &anchor())
            .unwrap_err();
        assert!(matches!(err, GuidanceError::NoFrameAvailable));
    }

    #[test]
    fn test_wrong_hand_fails() {
        let source = full_hand(Vector3::zeros());
        let err = capture_snapshot(&source, &RigidTransform::identity(), Handedness::Left, &anchor())
            .unwrap_err();
        assert!(matches!(err, GuidanceError::NoFrameAvailable));
    }

    #[test]
    fn test_duplicate_rotation_rejected() {
        let source = full_hand(Vector3::zeros());
        let mut snap = capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &anchor())
            .unwrap();
        let first = snap.joint_rots[0];
        snap.joint_rots.push(first);

        let sequence = PoseSequence {
            handedness: Handedness::Right,
            steps: vec![snap],
        };
        let err = sequence.validate().unwrap_err();
        assert!(err.contains("step 0"));
    }

    #[test]
    fn test_document_field_names() {
        let source = full_hand(Vector3::zeros());
        let snap = capture_snapshot(&source, &RigidTransform::identity(), Handedness::Right, &anchor())
            .unwrap();
        let sequence = PoseSequence {
            handedness: Handedness::Right,
            steps: vec![snap],
        };

        let value = serde_json::to_value(&sequence).unwrap();
        assert_eq!(value["handedness"], 2);
        assert!(value["steps"][0]["wristPose"]["position"]["x"].is_number());
        assert_eq!(value["steps"][0]["jointPoses"][0]["jointID"], 1);
        assert!(value["steps"][0]["jointRots"][0]["serializableQuat"]["w"].is_number());
    }
}
