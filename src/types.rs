//! Core types for the Punch Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw pose frames, keypoint samples, velocity estimates, motion
//! segments and the punch events handed to consumers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// 2-D vector in normalized image space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction, or `None` for a zero-length vector
    pub fn normalized(&self) -> Option<Vec2> {
        let len = self.length();
        if len > f64::EPSILON {
            Some(Vec2::new(self.x / len, self.y / len))
        } else {
            None
        }
    }

    pub fn distance(&self, other: Vec2) -> f64 {
        (*self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Arm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Left,
    Right,
}

impl Arm {
    pub const ALL: [Arm; 2] = [Arm::Left, Arm::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::Left => "left",
            Arm::Right => "right",
        }
    }

    /// Sign applied to image-space x so that +x points forward for this arm.
    ///
    /// With the camera facing the user, the right arm appears on the left of
    /// the image and punches travel toward +x; the left arm mirrors that.
    pub fn forward_sign(&self) -> f64 {
        match self {
            Arm::Left => -1.0,
            Arm::Right => 1.0,
        }
    }

    /// Map an image-space vector into this arm's frame (+x forward, +y up)
    pub fn to_arm_frame(&self, v: Vec2) -> Vec2 {
        Vec2::new(v.x * self.forward_sign(), -v.y)
    }

    pub fn wrist(&self) -> Joint {
        match self {
            Arm::Left => Joint::LeftWrist,
            Arm::Right => Joint::RightWrist,
        }
    }

    pub fn elbow(&self) -> Joint {
        match self {
            Arm::Left => Joint::LeftElbow,
            Arm::Right => Joint::RightElbow,
        }
    }

    pub fn shoulder(&self) -> Joint {
        match self {
            Arm::Left => Joint::LeftShoulder,
            Arm::Right => Joint::RightShoulder,
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked anatomical joints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
}

impl Joint {
    pub const ALL: [Joint; 6] = [
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
        }
    }

    /// Parse a joint name as reported by pose sources ("left_wrist", "left-wrist")
    pub fn from_name(name: &str) -> Option<Joint> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Joint::ALL.into_iter().find(|j| j.as_str() == normalized)
    }

    pub fn arm(&self) -> Arm {
        match self {
            Joint::LeftShoulder | Joint::LeftElbow | Joint::LeftWrist => Arm::Left,
            Joint::RightShoulder | Joint::RightElbow | Joint::RightWrist => Arm::Right,
        }
    }
}

/// One joint reading as delivered by the pose source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawKeypoint {
    pub x: f64,
    pub y: f64,
    pub confidence: f64,
}

/// One frame of pose output, before ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    /// Monotonic frame time (milliseconds)
    pub timestamp_ms: f64,
    /// Reported joints; missing joints are simply absent
    pub keypoints: BTreeMap<Joint, RawKeypoint>,
}

impl PoseFrame {
    pub fn new(timestamp_ms: f64) -> Self {
        Self {
            timestamp_ms,
            keypoints: BTreeMap::new(),
        }
    }

    /// Builder-style helper for inserting a joint reading
    pub fn with_joint(mut self, joint: Joint, x: f64, y: f64, confidence: f64) -> Self {
        self.keypoints.insert(joint, RawKeypoint { x, y, confidence });
        self
    }
}

/// A validated joint sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeypointSample {
    pub joint: Joint,
    pub position: Vec2,
    pub confidence: f64,
    pub timestamp_ms: f64,
}

/// Smoothed velocity of one joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityEstimate {
    /// Speed in normalized units per second
    pub magnitude: f64,
    /// Unit direction in image space
    pub direction: Vec2,
    /// Position of the newest sample
    pub position: Vec2,
    pub timestamp_ms: f64,
}

/// Phase of one arm's punch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmState {
    Idle,
    Winding,
    Extending,
    Peaked,
    Retracting,
}

impl ArmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmState::Idle => "idle",
            ArmState::Winding => "winding",
            ArmState::Extending => "extending",
            ArmState::Peaked => "peaked",
            ArmState::Retracting => "retracting",
        }
    }
}

/// A completed motion episode, candidate for classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSegment {
    pub arm: Arm,
    pub start_ms: f64,
    pub peak_ms: f64,
    pub end_ms: f64,
    /// Start position to farthest extension, image space
    pub displacement: Vec2,
    /// Units per second
    pub peak_velocity: f64,
    /// Lowest wrist confidence observed over the segment
    pub confidence_floor: f64,
    /// Largest arm extension ratio seen during the segment, when the
    /// shoulder and elbow were visible
    #[serde(default)]
    pub peak_reach: Option<f64>,
}

impl MotionSegment {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    pub fn extension(&self) -> f64 {
        self.displacement.length()
    }

    /// Direction angle in degrees, measured in the arm frame (0 = forward, 90 = up)
    pub fn angle_deg(&self) -> f64 {
        let v = self.arm.to_arm_frame(self.displacement);
        v.y.atan2(v.x).to_degrees()
    }
}

/// Punch classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PunchType {
    Jab,
    Cross,
    Hook,
    Uppercut,
}

impl PunchType {
    pub const ALL: [PunchType; 4] = [
        PunchType::Jab,
        PunchType::Cross,
        PunchType::Hook,
        PunchType::Uppercut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PunchType::Jab => "jab",
            PunchType::Cross => "cross",
            PunchType::Hook => "hook",
            PunchType::Uppercut => "uppercut",
        }
    }

    /// Straight punches are tied to a specific arm by stance
    pub fn is_straight(&self) -> bool {
        matches!(self, PunchType::Jab | PunchType::Cross)
    }
}

impl fmt::Display for PunchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fighting stance, decides which arm leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    /// Left arm leads
    #[default]
    Orthodox,
    /// Right arm leads
    Southpaw,
}

impl Stance {
    pub fn lead_arm(&self) -> Arm {
        match self {
            Stance::Orthodox => Arm::Left,
            Stance::Southpaw => Arm::Right,
        }
    }

    /// The straight punch thrown by the given arm in this stance
    pub fn straight_for(&self, arm: Arm) -> PunchType {
        if arm == self.lead_arm() {
            PunchType::Jab
        } else {
            PunchType::Cross
        }
    }
}

/// An accepted, classified punch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunchEvent {
    pub arm: Arm,
    pub punch_type: PunchType,
    /// Peak timestamp of the underlying segment (milliseconds)
    pub timestamp_ms: f64,
    /// Units per second
    pub peak_velocity: f64,
    /// Classification confidence (0-1), informational
    pub confidence: f64,
    /// Extension distance in normalized units
    pub extension: f64,
    /// Direction angle in the arm frame (degrees)
    pub angle_deg: f64,
}

/// Why the classifier refused a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Motion did not satisfy any punch type (guard reposition, feint)
    MotionOnly,
    /// Satisfied geometry but wrist tracking was too uncertain
    LowConfidence { floor: f64 },
}

/// Why a state machine dropped an in-progress segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// Wrist was invalid for longer than the maximum gap
    ConfidenceGap,
    /// The wrist track was re-acquired after a gap
    TrackReset,
    /// Segment exceeded the duration ceiling
    DurationCeiling,
    /// Onset was not followed by sustained motion
    NotSustained,
}
