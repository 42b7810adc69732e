// Frame-of-reference algebra
// world -> anchor-local -> parent-local conversions, no state

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::joints::{JointId, ALL_JOINTS};
use super::pose::Pose;

/// Rigid transform (rotation then translation)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl RigidTransform {
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        RigidTransform { position, rotation }
    }

    pub fn identity() -> Self {
        RigidTransform {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_pose(pose: &Pose) -> Self {
        RigidTransform::new(pose.position, pose.rotation)
    }

    /// Maps a pose expressed in this transform's local space to the parent space
    pub fn transform_pose(&self, local: &Pose) -> Pose {
        Pose::new(
            self.position + self.rotation * local.position,
            self.rotation * local.rotation,
        )
    }

    /// Maps a parent-space pose into this transform's local space
    pub fn inverse_transform_pose(&self, pose: &Pose) -> Pose {
        let inv = self.rotation.inverse();
        Pose::new(inv * (pose.position - self.position), inv * pose.rotation)
    }

    pub fn transform_point(&self, local: &Vector3<f32>) -> Vector3<f32> {
        self.position + self.rotation * local
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        RigidTransform::identity()
    }
}

/// The frozen reference frame locked at session start
pub type AnchorFrame = RigidTransform;

/// World pose -> anchor-local pose
pub fn to_anchor_local(world: &Pose, anchor: &AnchorFrame) -> Pose {
    anchor.inverse_transform_pose(world)
}

/// Anchor-local pose -> world pose
pub fn from_anchor_local(local: &Pose, anchor: &AnchorFrame) -> Pose {
    anchor.transform_pose(local)
}

/// Rotation of a child relative to its parent. Without a parent the
/// child's rotation is returned as-is, so callers pass rotations that
/// are already anchor-local.
pub fn parent_relative_rotation(
    child: &UnitQuaternion<f32>,
    parent: Option<&UnitQuaternion<f32>>,
) -> UnitQuaternion<f32> {
    match parent {
        Some(parent) => parent.inverse() * child,
        None => *child,
    }
}

/// Rebuilds per-joint rotations in the root's frame from parent-relative
/// rotations. `local` must hold the root's own rotation under Wrist.
/// Joints with no entry, or whose parent could not be resolved, are left out.
pub fn compose_world_rotations(
    local: &BTreeMap<JointId, UnitQuaternion<f32>>,
) -> BTreeMap<JointId, UnitQuaternion<f32>> {
    let mut world = BTreeMap::new();

    for joint in ALL_JOINTS {
        let Some(rel) = local.get(&joint) else {
            continue;
        };

        match joint.parent() {
            None => {
                world.insert(joint, *rel);
            }
            Some(parent) => {
                if let Some(parent_world) = world.get(&parent).copied() {
                    world.insert(joint, parent_world * rel);
                }
            }
        }
    }

    world
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> AnchorFrame {
        RigidTransform::new(
            Vector3::new(0.4, 1.2, -0.3),
            UnitQuaternion::from_euler_angles(0.2, 1.3, -0.6),
        )
    }

    fn close(a: &Pose, b: &Pose) -> bool {
        (a.position - b.position).norm() < 1e-5 && a.rotation.angle_to(&b.rotation) < 1e-4
    }

    #[test]
    fn test_anchor_local_round_trip() {
        let world = Pose::new(
            Vector3::new(0.55, 1.05, -0.1),
            UnitQuaternion::from_euler_angles(-0.4, 0.1, 2.0),
        );

        for a in [anchor(), RigidTransform::identity()] {
            let local = to_anchor_local(&world, &a);
            let back = from_anchor_local(&local, &a);
            assert!(close(&world, &back));
        }
    }

    #[test]
    fn test_anchor_pose_is_local_origin() {
        let a = anchor();
        let world = Pose::new(a.position, a.rotation);
        let local = to_anchor_local(&world, &a);

        assert!(local.position.norm() < 1e-6);
        assert!(local.rotation.angle() < 1e-4);
    }

    #[test]
    fn test_local_position_uses_inverse_rotation() {
        let a = RigidTransform::new(
            Vector3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2),
        );
        // One unit along world +Y from the anchor is local +X after undoing a 90 deg yaw
        let world = Pose::new(Vector3::new(1.0, 1.0, 0.0), UnitQuaternion::identity());
        let local = to_anchor_local(&world, &a);
        assert!((local.position - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_parent_relative_rotation_closure() {
        let parent = UnitQuaternion::from_euler_angles(0.5, -0.2, 0.9);
        let child = UnitQuaternion::from_euler_angles(-1.1, 0.4, 0.3);

        let rel = parent_relative_rotation(&child, Some(&parent));
        assert!((parent * rel).angle_to(&child) < 1e-4);
    }

    #[test]
    fn test_root_rotation_passes_through() {
        let child = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        assert_eq!(parent_relative_rotation(&child, None), child);
    }

    #[test]
    fn test_compose_world_rotations_reconstructs_chain() {
        let mut world_in = BTreeMap::new();
        for (i, joint) in ALL_JOINTS.iter().enumerate() {
            let f = i as f32 * 0.1;
            world_in.insert(*joint, UnitQuaternion::from_euler_angles(f, -f * 0.5, f * 0.3));
        }

        let mut local = BTreeMap::new();
        for joint in ALL_JOINTS {
            let parent = joint.parent().map(|p| world_in[&p]);
            local.insert(joint, parent_relative_rotation(&world_in[&joint], parent.as_ref()));
        }

        let rebuilt = compose_world_rotations(&local);
        assert_eq!(rebuilt.len(), ALL_JOINTS.len());
        for joint in ALL_JOINTS {
            assert!(rebuilt[&joint].angle_to(&world_in[&joint]) < 1e-3);
        }
    }

    #[test]
    fn test_compose_skips_orphaned_descendants() {
        let mut local = BTreeMap::new();
        for joint in ALL_JOINTS {
            if joint != JointId::IndexProximal {
                local.insert(joint, UnitQuaternion::identity());
            }
        }

        let rebuilt = compose_world_rotations(&local);
        assert!(!rebuilt.contains_key(&JointId::IndexProximal));
        assert!(!rebuilt.contains_key(&JointId::IndexTip));
        assert!(rebuilt.contains_key(&JointId::MiddleTip));
    }
}
