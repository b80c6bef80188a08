//! Skeleton pose model and the replayed skeleton frame.
use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{ReplayError, Result};
use crate::frame::ReplayFrame;
use crate::frame::live::LiveSkeletonFrame;
use crate::frame::payload::ReadSeek;

/// Number of skeleton slots a sensor reports per frame.
pub const SKELETON_COUNT: usize = 6;

/// Number of tracked joints per skeleton.
pub const JOINT_COUNT: usize = 20;

/// Camera-space position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SkeletonPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SkeletonPoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointType {
    HipCenter,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointType {
    /// Every joint, in the order joints are stored on a [`Skeleton`].
    pub const ALL: [JointType; JOINT_COUNT] = [
        JointType::HipCenter,
        JointType::Spine,
        JointType::ShoulderCenter,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JointTrackingState {
    #[default]
    NotTracked,
    Inferred,
    Tracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub joint_type: JointType,
    pub tracking_state: JointTrackingState,
    pub position: SkeletonPoint,
}

impl Joint {
    pub fn untracked(joint_type: JointType) -> Self {
        Self {
            joint_type,
            tracking_state: JointTrackingState::NotTracked,
            position: SkeletonPoint::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkeletonTrackingState {
    #[default]
    NotTracked,
    PositionOnly,
    Tracked,
}

/// Bits of [`Skeleton::clipped_edges`].
pub mod clipped {
    pub const RIGHT: u32 = 1;
    pub const LEFT: u32 = 2;
    pub const TOP: u32 = 4;
    pub const BOTTOM: u32 = 8;
}

/// One tracked (or empty) skeleton slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub tracking_id: i32,
    pub tracking_state: SkeletonTrackingState,
    /// Root position of the body.
    pub position: SkeletonPoint,
    /// Field-of-view edges the body crosses, see [`clipped`].
    pub clipped_edges: u32,
    /// Player index the sensor assigned to this body, 0 when unassigned.
    pub user_index: i32,
    /// Indexed by [`JointType::index`].
    pub joints: [Joint; JOINT_COUNT],
}

impl Default for Skeleton {
    fn default() -> Self {
        Self {
            tracking_id: 0,
            tracking_state: SkeletonTrackingState::NotTracked,
            position: SkeletonPoint::default(),
            clipped_edges: 0,
            user_index: 0,
            joints: JointType::ALL.map(Joint::untracked),
        }
    }
}

impl Skeleton {
    pub fn joint(&self, joint_type: JointType) -> &Joint {
        &self.joints[joint_type.index()]
    }

    pub fn joint_mut(&mut self, joint_type: JointType) -> &mut Joint {
        &mut self.joints[joint_type.index()]
    }

    pub fn is_tracked(&self) -> bool {
        self.tracking_state == SkeletonTrackingState::Tracked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkeletonTrackingMode {
    #[default]
    Default,
    Seated,
    Other(i32),
}

impl SkeletonTrackingMode {
    pub fn from_tag(tag: i32) -> Self {
        match tag {
            0 => SkeletonTrackingMode::Default,
            1 => SkeletonTrackingMode::Seated,
            other => SkeletonTrackingMode::Other(other),
        }
    }

    pub fn tag(self) -> i32 {
        match self {
            SkeletonTrackingMode::Default => 0,
            SkeletonTrackingMode::Seated => 1,
            SkeletonTrackingMode::Other(tag) => tag,
        }
    }
}

/// A skeleton frame read back from a log, or converted from a live frame.
///
/// Skeleton payloads are small, so they are always decoded eagerly.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySkeletonFrame {
    frame_number: i32,
    timestamp: i64,
    tracking_mode: SkeletonTrackingMode,
    floor_clip_plane: [f32; 4],
    skeletons: Vec<Skeleton>,
}

impl ReplaySkeletonFrame {
    pub fn from_live(frame: &impl LiveSkeletonFrame) -> Self {
        Self {
            frame_number: frame.frame_number(),
            timestamp: frame.timestamp(),
            tracking_mode: frame.tracking_mode(),
            floor_clip_plane: frame.floor_clip_plane(),
            skeletons: frame.skeletons().to_vec(),
        }
    }

    /// Decode the record body that follows a skeleton tag.
    pub(crate) fn read_from(stream: &mut dyn ReadSeek) -> Result<Self> {
        let timestamp = stream.read_i64::<LittleEndian>()?;
        let tracking_mode = SkeletonTrackingMode::from_tag(stream.read_i32::<LittleEndian>()?);
        let mut floor_clip_plane = [0f32; 4];
        stream.read_f32_into::<LittleEndian>(&mut floor_clip_plane)?;
        let frame_number = stream.read_i32::<LittleEndian>()?;
        let count = stream.read_u64::<LittleEndian>()?;
        if count != SKELETON_COUNT as u64 {
            return Err(ReplayError::format(format!(
                "skeleton frame {frame_number} holds {count} slots, expected {SKELETON_COUNT}"
            )));
        }
        let skeletons = (0..SKELETON_COUNT)
            .map(|_| bincode::deserialize_from::<_, Skeleton>(&mut *stream))
            .collect::<bincode::Result<Vec<_>>>()?;
        Ok(Self { frame_number, timestamp, tracking_mode, floor_clip_plane, skeletons })
    }

    pub fn tracking_mode(&self) -> SkeletonTrackingMode {
        self.tracking_mode
    }

    /// Floor plane coefficients `(a, b, c, d)` of `ax + by + cz + d = 0`.
    pub fn floor_clip_plane(&self) -> [f32; 4] {
        self.floor_clip_plane
    }

    pub fn skeletons(&self) -> &[Skeleton] {
        &self.skeletons
    }

    pub fn tracked_skeletons(&self) -> impl Iterator<Item = &Skeleton> {
        self.skeletons.iter().filter(|s| s.is_tracked())
    }
}

impl ReplayFrame for ReplaySkeletonFrame {
    const KIND: &'static str = "skeletons";

    fn frame_number(&self) -> i32 {
        self.frame_number
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_skeleton_has_every_joint_in_order() {
        let s = Skeleton::default();
        for (i, joint) in s.joints.iter().enumerate() {
            assert_eq!(joint.joint_type.index(), i);
            assert_eq!(joint.tracking_state, JointTrackingState::NotTracked);
        }
        assert_eq!(s.joint(JointType::Head).joint_type, JointType::Head);
        assert!(!s.is_tracked());
    }

    #[test]
    fn tracking_mode_tags() {
        assert_eq!(SkeletonTrackingMode::from_tag(1), SkeletonTrackingMode::Seated);
        assert_eq!(SkeletonTrackingMode::from_tag(9).tag(), 9);
    }
}
