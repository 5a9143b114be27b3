//! Keypoint ingestion
//!
//! Converts one pose frame into validated keypoint samples. Joints below the
//! confidence floor, or with coordinates outside normalized image space, are
//! excluded from the frame instead of being passed on as garbage positions.

use crate::error::TrackerError;
use crate::types::{Arm, Joint, KeypointSample, PoseFrame, Vec2};
use std::collections::BTreeMap;
use tracing::debug;

/// Validated samples for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedFrame {
    pub timestamp_ms: f64,
    pub samples: BTreeMap<Joint, KeypointSample>,
    /// Joints present in the frame but excluded as invalid
    pub rejected: Vec<Joint>,
}

impl IngestedFrame {
    pub fn sample(&self, joint: Joint) -> Option<&KeypointSample> {
        self.samples.get(&joint)
    }

    /// Arm extension ratio: wrist-to-shoulder distance over upper arm plus
    /// forearm length. Near 1.0 for a straight arm, lower when bent.
    ///
    /// `None` unless the shoulder, elbow and wrist are all valid this frame.
    pub fn arm_reach(&self, arm: Arm) -> Option<f64> {
        let shoulder = self.sample(arm.shoulder())?.position;
        let elbow = self.sample(arm.elbow())?.position;
        let wrist = self.sample(arm.wrist())?.position;
        let arm_length = shoulder.distance(elbow) + elbow.distance(wrist);
        if arm_length <= f64::EPSILON {
            return None;
        }
        Some(shoulder.distance(wrist) / arm_length)
    }
}

/// Stateless keypoint ingestor
#[derive(Debug, Clone, Copy)]
pub struct KeypointIngestor {
    confidence_floor: f64,
}

impl KeypointIngestor {
    pub fn new(confidence_floor: f64) -> Self {
        Self { confidence_floor }
    }

    /// Validate a frame's joints against the confidence floor
    pub fn ingest(&self, frame: &PoseFrame) -> Result<IngestedFrame, TrackerError> {
        if !frame.timestamp_ms.is_finite() {
            return Err(TrackerError::InvalidTimestamp(frame.timestamp_ms));
        }

        let mut samples = BTreeMap::new();
        let mut rejected = Vec::new();

        for (&joint, kp) in &frame.keypoints {
            if self.is_valid(kp.x, kp.y, kp.confidence) {
                samples.insert(
                    joint,
                    KeypointSample {
                        joint,
                        position: Vec2::new(kp.x, kp.y),
                        confidence: kp.confidence,
                        timestamp_ms: frame.timestamp_ms,
                    },
                );
            } else {
                debug!(
                    joint = joint.as_str(),
                    confidence = kp.confidence,
                    "excluding invalid keypoint"
                );
                rejected.push(joint);
            }
        }

        Ok(IngestedFrame {
            timestamp_ms: frame.timestamp_ms,
            samples,
            rejected,
        })
    }

    fn is_valid(&self, x: f64, y: f64, confidence: f64) -> bool {
        confidence.is_finite()
            && confidence >= self.confidence_floor
            && confidence <= 1.0
            && (0.0..=1.0).contains(&x)
            && (0.0..=1.0).contains(&y)
    }
}
