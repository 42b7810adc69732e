// Hand joint identifiers and the static joint hierarchy
// Wire codes follow the XR hand joint numbering used by the persisted sequence files

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which hand a sequence or live read refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Single-letter suffix used in file names and trace logs
    pub fn suffix(&self) -> &'static str {
        match self {
            Handedness::Left => "L",
            Handedness::Right => "R",
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Handedness::Left => 1,
            Handedness::Right => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Handedness::Left),
            2 => Some(Handedness::Right),
            _ => None,
        }
    }

    pub fn to_string(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "left" | "L" => Some(Handedness::Left),
            "right" | "R" => Some(Handedness::Right),
            _ => None,
        }
    }
}

impl Default for Handedness {
    fn default() -> Self {
        Handedness::Right
    }
}

impl From<Handedness> for u8 {
    fn from(h: Handedness) -> u8 {
        h.code()
    }
}

impl TryFrom<u8> for Handedness {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Handedness::from_code(code).ok_or_else(|| format!("unknown handedness code {}", code))
    }
}

/// One of the 26 tracked hand landmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum JointId {
    Wrist,
    Palm,
    ThumbMetacarpal,
    ThumbProximal,
    ThumbDistal,
    ThumbTip,
    IndexMetacarpal,
    IndexProximal,
    IndexIntermediate,
    IndexDistal,
    IndexTip,
    MiddleMetacarpal,
    MiddleProximal,
    MiddleIntermediate,
    MiddleDistal,
    MiddleTip,
    RingMetacarpal,
    RingProximal,
    RingIntermediate,
    RingDistal,
    RingTip,
    LittleMetacarpal,
    LittleProximal,
    LittleIntermediate,
    LittleDistal,
    LittleTip,
}

/// Every joint, parents always listed before their children
pub const ALL_JOINTS: [JointId; 26] = [
    JointId::Wrist,
    JointId::Palm,
    JointId::ThumbMetacarpal,
    JointId::ThumbProximal,
    JointId::ThumbDistal,
    JointId::ThumbTip,
    JointId::IndexMetacarpal,
    JointId::IndexProximal,
    JointId::IndexIntermediate,
    JointId::IndexDistal,
    JointId::IndexTip,
    JointId::MiddleMetacarpal,
    JointId::MiddleProximal,
    JointId::MiddleIntermediate,
    JointId::MiddleDistal,
    JointId::MiddleTip,
    JointId::RingMetacarpal,
    JointId::RingProximal,
    JointId::RingIntermediate,
    JointId::RingDistal,
    JointId::RingTip,
    JointId::LittleMetacarpal,
    JointId::LittleProximal,
    JointId::LittleIntermediate,
    JointId::LittleDistal,
    JointId::LittleTip,
];

/// Joints whose positions are recorded and used as evaluation targets
pub const POSITION_TRACKED: [JointId; 6] = [
    JointId::Wrist,
    JointId::ThumbTip,
    JointId::IndexTip,
    JointId::MiddleTip,
    JointId::RingTip,
    JointId::LittleTip,
];

/// Finger a joint belongs to (None for wrist and palm)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl JointId {
    /// Parent in the hierarchy; the wrist is the root
    pub fn parent(&self) -> Option<JointId> {
        use JointId::*;
        match self {
            Wrist => None,
            Palm => Some(Wrist),

            ThumbMetacarpal => Some(Wrist),
            ThumbProximal => Some(ThumbMetacarpal),
            ThumbDistal => Some(ThumbProximal),
            ThumbTip => Some(ThumbDistal),

            IndexMetacarpal => Some(Wrist),
            IndexProximal => Some(IndexMetacarpal),
            IndexIntermediate => Some(IndexProximal),
            IndexDistal => Some(IndexIntermediate),
            IndexTip => Some(IndexDistal),

            MiddleMetacarpal => Some(Wrist),
            MiddleProximal => Some(MiddleMetacarpal),
            MiddleIntermediate => Some(MiddleProximal),
            MiddleDistal => Some(MiddleIntermediate),
            MiddleTip => Some(MiddleDistal),

            RingMetacarpal => Some(Wrist),
            RingProximal => Some(RingMetacarpal),
            RingIntermediate => Some(RingProximal),
            RingDistal => Some(RingIntermediate),
            RingTip => Some(RingDistal),

            LittleMetacarpal => Some(Wrist),
            LittleProximal => Some(LittleMetacarpal),
            LittleIntermediate => Some(LittleProximal),
            LittleDistal => Some(LittleIntermediate),
            LittleTip => Some(LittleDistal),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn finger(&self) -> Option<Finger> {
        use JointId::*;
        match self {
            Wrist | Palm => None,
            ThumbMetacarpal | ThumbProximal | ThumbDistal | ThumbTip => Some(Finger::Thumb),
            IndexMetacarpal | IndexProximal | IndexIntermediate | IndexDistal | IndexTip => {
                Some(Finger::Index)
            }
            MiddleMetacarpal | MiddleProximal | MiddleIntermediate | MiddleDistal | MiddleTip => {
                Some(Finger::Middle)
            }
            RingMetacarpal | RingProximal | RingIntermediate | RingDistal | RingTip => {
                Some(Finger::Ring)
            }
            LittleMetacarpal | LittleProximal | LittleIntermediate | LittleDistal | LittleTip => {
                Some(Finger::Little)
            }
        }
    }

    /// Wire code in the persisted format (Wrist = 1 .. LittleTip = 26)
    pub fn code(&self) -> u8 {
        ALL_JOINTS
            .iter()
            .position(|j| j == self)
            .map(|i| i as u8 + 1)
            .unwrap_or(0)
    }

    pub fn from_code(code: u8) -> Option<Self> {
        if code == 0 {
            return None;
        }
        ALL_JOINTS.get(code as usize - 1).copied()
    }

    pub fn name(&self) -> &'static str {
        use JointId::*;
        match self {
            Wrist => "Wrist",
            Palm => "Palm",
            ThumbMetacarpal => "ThumbMetacarpal",
            ThumbProximal => "ThumbProximal",
            ThumbDistal => "ThumbDistal",
            ThumbTip => "ThumbTip",
            IndexMetacarpal => "IndexMetacarpal",
            IndexProximal => "IndexProximal",
            IndexIntermediate => "IndexIntermediate",
            IndexDistal => "IndexDistal",
            IndexTip => "IndexTip",
            MiddleMetacarpal => "MiddleMetacarpal",
            MiddleProximal => "MiddleProximal",
            MiddleIntermediate => "MiddleIntermediate",
            MiddleDistal => "MiddleDistal",
            MiddleTip => "MiddleTip",
            RingMetacarpal => "RingMetacarpal",
            RingProximal => "RingProximal",
            RingIntermediate => "RingIntermediate",
            RingDistal => "RingDistal",
            RingTip => "RingTip",
            LittleMetacarpal => "LittleMetacarpal",
            LittleProximal => "LittleProximal",
            LittleIntermediate => "LittleIntermediate",
            LittleDistal => "LittleDistal",
            LittleTip => "LittleTip",
        }
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<JointId> for u8 {
    fn from(id: JointId) -> u8 {
        id.code()
    }
}

impl TryFrom<u8> for JointId {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        JointId::from_code(code).ok_or_else(|| format!("unknown joint code {}", code))
    }
}
