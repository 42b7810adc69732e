// Hand model module
// Joint identifiers, hierarchy, pose types, frame math and the live joint source

pub mod frame;
pub mod joints;
pub mod pose;
pub mod source;

pub use frame::{
    compose_world_rotations, from_anchor_local, parent_relative_rotation, to_anchor_local,
    AnchorFrame, RigidTransform,
};
pub use joints::{Finger, Handedness, JointId, ALL_JOINTS, POSITION_TRACKED};
pub use pose::{JointPose, JointRot, Pose, SerializablePose, SerializableQuat, SerializableVec3};
pub use source::{read_world_pose, GateStatus, JointSource, TrackingConfig, TrackingGate};
