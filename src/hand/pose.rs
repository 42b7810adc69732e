// Pose types and their persisted representations
// Serializable structs keep raw float components so files round-trip exactly

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::joints::JointId;

/// Position + orientation. The frame (tracking, world, anchor-local)
/// is given by where the pose came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Pose {
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Pose { position, rotation }
    }

    pub fn identity() -> Self {
        Pose {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// True when every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.rotation.coords.iter().all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::identity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializableVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SerializableVec3 {
    pub fn to_vector(&self) -> Vector3<f32> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn from_vector(v: &Vector3<f32>) -> Self {
        SerializableVec3 {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SerializableQuat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for SerializableQuat {
    fn default() -> Self {
        SerializableQuat {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl SerializableQuat {
    /// Renormalizes the stored components. A zero or non-finite
    /// quaternion yields the identity rotation.
    pub fn to_unit(&self) -> UnitQuaternion<f32> {
        let q = Quaternion::new(self.w, self.x, self.y, self.z);
        let norm = q.norm();
        if !norm.is_finite() || norm < 1e-6 {
            return UnitQuaternion::identity();
        }
        UnitQuaternion::from_quaternion(q)
    }

    pub fn from_unit(q: &UnitQuaternion<f32>) -> Self {
        SerializableQuat {
            x: q.i,
            y: q.j,
            z: q.k,
            w: q.w,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SerializablePose {
    pub position: SerializableVec3,
    pub rotation: SerializableQuat,
}

impl SerializablePose {
    pub fn to_pose(&self) -> Pose {
        Pose::new(self.position.to_vector(), self.rotation.to_unit())
    }

    pub fn from_pose(p: &Pose) -> Self {
        SerializablePose {
            position: SerializableVec3::from_vector(&p.position),
            rotation: SerializableQuat::from_unit(&p.rotation),
        }
    }
}

/// Anchor-local pose of a position-tracked joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointPose {
    #[serde(rename = "jointID")]
    pub joint_id: JointId,
    #[serde(rename = "serializablePose")]
    pub pose: SerializablePose,
}

/// Parent-relative rotation of a joint (anchor-local for the wrist)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointRot {
    #[serde(rename = "jointID")]
    pub joint_id: JointId,
    #[serde(rename = "serializableQuat")]
    pub rotation: SerializableQuat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_unit_renormalizes() {
        let q = SerializableQuat {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 2.0,
        };
        let unit = q.to_unit();
        assert!((unit.w - 1.0).abs() < 1e-6);
        assert!((unit.quaternion().norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_quat_is_identity() {
        let zero = SerializableQuat {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 0.0,
        };
        assert_eq!(zero.to_unit(), UnitQuaternion::identity());

        let nan = SerializableQuat {
            x: f32::NAN,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        };
        assert_eq!(nan.to_unit(), UnitQuaternion::identity());
    }

    #[test]
    fn test_component_order_preserved() {
        let rot = UnitQuaternion::from_euler_angles(0.3, -0.7, 1.1);
        let s = SerializableQuat::from_unit(&rot);
        assert_eq!(s.x, rot.i);
        assert_eq!(s.y, rot.j);
        assert_eq!(s.z, rot.k);
        assert_eq!(s.w, rot.w);
        assert!(s.to_unit().angle_to(&rot) < 1e-5);
    }

    #[test]
    fn test_joint_pose_field_names() {
        let jp = JointPose {
            joint_id: JointId::IndexTip,
            pose: SerializablePose::default(),
        };
        let value = serde_json::to_value(&jp).unwrap();
        assert_eq!(value["jointID"], 11);
        assert_eq!(value["serializablePose"]["rotation"]["w"], 1.0);
    }

    #[test]
    fn test_pose_is_finite() {
        let mut pose = Pose::identity();
        assert!(pose.is_finite());
        pose.position.x = f32::INFINITY;
        assert!(!pose.is_finite());
    }
}
